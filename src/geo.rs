use std::fmt;

pub const METERS_PER_DEGREE_LATITUDE: f64 = 60. * 1852.;

///
/// The length of a degree longitude varies by the latitude,
/// the more north or south you get the shorter it becomes.
/// Since the earth is _nearly_ a sphere, the cosine function
/// is _very_ close.
///
pub fn meters_per_degree_longitude(lat: &f64) -> f64 {
    METERS_PER_DEGREE_LATITUDE * lat.to_radians().cos()
}

/// A geographic position expressed in degrees latitude and longitude.
/// Latitude is positive in the northern hemisphere, negative in the southern.
/// Longitude is positive in the eastern hemisphere, negative in the western.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPosition {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPosition {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPosition { lat, lon }
    }

    /// False for a fix that cannot have come from a real sensor.
    pub fn is_valid(&self) -> bool {
        self.lat <= 90. && self.lat >= -90. && self.lon <= 180. && self.lon >= -180.
    }
}

impl fmt::Display for GeoPosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

/// A geographic position plus the motion state a tracked target carries:
/// velocity in meters/second along the latitude and longitude axes, the
/// speed over ground in knots and its standard deviation, and the capture
/// time of the fix in milliseconds.
#[derive(Debug, Clone)]
pub struct ExtendedPosition {
    pub pos: GeoPosition,
    pub dlat_dt: f64, // m / sec
    pub dlon_dt: f64, // m / sec
    pub time: u64,    // millis
    pub speed_kn: f64,
    pub sd_speed_kn: f64, // standard deviation of the speed in knots
}

impl ExtendedPosition {
    pub fn new(
        pos: GeoPosition,
        dlat_dt: f64,
        dlon_dt: f64,
        time: u64,
        speed_kn: f64,
        sd_speed_kn: f64,
    ) -> Self {
        Self {
            pos,
            dlat_dt,
            dlon_dt,
            time,
            speed_kn,
            sd_speed_kn,
        }
    }

    pub fn empty() -> Self {
        Self::new(GeoPosition::new(0., 0.), 0., 0., 0, 0., 0.)
    }
}
