use std::f64::consts::PI;

use crate::geo::{meters_per_degree_longitude, ExtendedPosition, GeoPosition, METERS_PER_DEGREE_LATITUDE};
use crate::polar::Polar;

/// Immutable geometry of the sensor feeding one registry: spoke counts,
/// image depth, Doppler capability and the scale factors needed to convert
/// between the polar image and geographic positions.
#[derive(Debug, Clone)]
pub(crate) struct TargetSetup {
    pub radar_id: usize,
    pub spokes: i32,
    pub spokes_f64: f64,
    pub spoke_len: i32,
    pub have_doppler: bool,
    pub pixels_per_meter: f64,
    pub rotation_period_ms: u64,
}

impl TargetSetup {
    pub fn new(radar_id: usize, spokes: usize, spoke_len: usize, have_doppler: bool) -> Self {
        TargetSetup {
            radar_id,
            spokes: spokes as i32,
            spokes_f64: spokes as f64,
            spoke_len: spoke_len as i32,
            have_doppler,
            pixels_per_meter: 0.,
            rotation_period_ms: 0,
        }
    }

    pub fn mod_spokes(&self, angle: i32) -> i32 {
        angle.rem_euclid(self.spokes)
    }

    /// Number of spokes that a next scan of the target may have moved,
    /// 1/10th of a circle.
    pub fn scan_margin(&self) -> i32 {
        self.spokes / 10
    }

    pub fn rotation_period(&self) -> u64 {
        if self.rotation_period_ms == 0 {
            2500 // default value
        } else {
            self.rotation_period_ms
        }
    }

    /// The radar currently serving a position. Re-resolved on every predict
    /// step; with a single sensor per registry the answer is constant, but
    /// callers must not hold on to it across rotations.
    pub fn serving_radar(&self, _pos: &GeoPosition) -> usize {
        self.radar_id
    }

    /// Convert an image cell to a geographic position, based on the own-ship
    /// position `own_ship`. The own-ship position may be from an earlier
    /// time than the current position, typically the fix recorded when the
    /// cell's spoke was captured.
    pub fn polar2pos(&self, pol: &Polar, own_ship: &ExtendedPosition) -> ExtendedPosition {
        let mut pos = own_ship.clone();
        pos.pos.lat += (pol.r as f64 / self.pixels_per_meter)
            * pol.angle_in_rad(self.spokes_f64).cos()
            / METERS_PER_DEGREE_LATITUDE;
        pos.pos.lon += (pol.r as f64 / self.pixels_per_meter)
            * pol.angle_in_rad(self.spokes_f64).sin()
            / meters_per_degree_longitude(&own_ship.pos.lat);
        pos
    }

    /// Convert a geographic position to the image cell it falls in, relative
    /// to the own-ship position `own_ship`.
    pub fn pos2polar(&self, p: &ExtendedPosition, own_ship: &ExtendedPosition) -> Polar {
        let dif_lat = p.pos.lat - own_ship.pos.lat;
        let dif_lon = (p.pos.lon - own_ship.pos.lon) * own_ship.pos.lat.to_radians().cos();
        let r = ((dif_lat * dif_lat + dif_lon * dif_lon).sqrt()
            * METERS_PER_DEGREE_LATITUDE
            * self.pixels_per_meter)
            .round() as i32;
        let angle = (f64::atan2(dif_lon, dif_lat) * self.spokes_f64 / (2. * PI)).round() as i32;
        Polar::new(self.mod_spokes(angle), r, p.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> TargetSetup {
        let mut setup = TargetSetup::new(0, 2048, 1024, false);
        setup.pixels_per_meter = 0.5;
        setup
    }

    #[test]
    fn polar_geo_round_trip() {
        let setup = setup();
        let own = ExtendedPosition::new(GeoPosition::new(53., 5.), 0., 0., 0, 0., 0.);
        for (angle, r) in [(0, 400), (512, 600), (1300, 900), (2000, 80)] {
            let pol = Polar::new(angle, r, 0);
            let pos = setup.polar2pos(&pol, &own);
            let back = setup.pos2polar(&pos, &own);
            assert!(
                (back.angle - angle).abs() <= 1,
                "angle {} -> {}",
                angle,
                back.angle
            );
            assert!((back.r - r).abs() <= 1, "r {} -> {}", r, back.r);
        }
    }

    #[test]
    fn mod_spokes_wraps_negative() {
        let setup = setup();
        assert_eq!(setup.mod_spokes(-1), 2047);
        assert_eq!(setup.mod_spokes(2048), 0);
        assert_eq!(setup.mod_spokes(4097), 1);
    }
}
