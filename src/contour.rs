use crate::polar::Polar;

/// A blob whose boundary walk closes in fewer steps than this is noise, not
/// a target.
pub const MIN_CONTOUR_LENGTH: usize = 6;

/// Hard cap on the boundary walk; longer boundaries are closed early.
pub const MAX_CONTOUR_LENGTH: usize = 2000;

/// Contours at or beyond this length are treated as clutter (interference,
/// landmass) and never accepted as a target.
pub const MAX_CONTOUR_LENGTH_USED: usize = 500;

/// The traced boundary of one blob, walked clockwise, with its bounding
/// bearing/range extents and the midpoint of those extents.
///
/// `min_angle` is normalized to `[0, spokes)`; `max_angle` may exceed the
/// spoke count when the blob straddles the zero bearing, so that
/// `min_angle..=max_angle` always covers the blob.
#[derive(Debug, Clone, Default)]
pub struct Contour {
    pub length: i32,
    pub min_angle: i32,
    pub max_angle: i32,
    pub min_r: i32,
    pub max_r: i32,
    /// Midpoint of the extents, with the capture time of its spoke.
    pub position: Polar,
    pub points: Vec<Polar>,
}

impl Contour {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn angular_width(&self) -> i32 {
        self.max_angle - self.min_angle
    }

    pub fn radial_extent(&self) -> i32 {
        self.max_r - self.min_r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_contour() {
        let contour = Contour::new();
        assert_eq!(contour.length, 0);
        assert!(contour.points.is_empty());
    }

    #[test]
    fn extents() {
        let contour = Contour {
            min_angle: 100,
            max_angle: 150,
            min_r: 50,
            max_r: 80,
            ..Contour::new()
        };
        assert_eq!(contour.angular_width(), 50);
        assert_eq!(contour.radial_extent(), 30);
    }
}
