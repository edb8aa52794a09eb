use bitflags::bitflags;
use std::cmp::{max, min};
use std::f64::consts::PI;

use crate::contour::{Contour, MAX_CONTOUR_LENGTH, MIN_CONTOUR_LENGTH};
use crate::doppler::Doppler;
use crate::geo::GeoPosition;
use crate::polar::Polar;
use crate::TrackError;

bitflags! {
    /// The per-cell bitfield of the polar image.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct HistoryPixel: u8 {
        /// Above threshold this rotation.
        const TARGET = 0b1000_0000;
        /// Sticky copy of TARGET; never cleared by target processing.
        const BACKUP = 0b0100_0000;
        /// Doppler approaching bit.
        const APPROACHING = 0b0010_0000;
        /// Doppler receding bit.
        const RECEDING = 0b0001_0000;
        /// Cell was on a traced boundary; painted into the next sweep.
        const CONTOUR = 0b0000_1000;

        const INITIAL = Self::TARGET.bits() | Self::BACKUP.bits();
    }
}

// The four axis-aligned translations that move from one boundary cell to the
// next, in the rotation order the boundary walk tries them.
const FOUR_DIRECTIONS: [Polar; 4] = [
    Polar {
        angle: 0,
        r: 1,
        time: 0,
    },
    Polar {
        angle: 1,
        r: 0,
        time: 0,
    },
    Polar {
        angle: 0,
        r: -1,
        time: 0,
    },
    Polar {
        angle: -1,
        r: 0,
        time: 0,
    },
];

#[derive(Debug, Clone)]
pub(crate) struct HistorySpoke {
    pub sweep: Vec<HistoryPixel>,
    pub time: u64,
    pub pos: GeoPosition,
}

impl HistorySpoke {
    fn new(spoke_len: usize) -> Self {
        Self {
            sweep: vec![HistoryPixel::empty(); spoke_len],
            time: 0,
            pos: GeoPosition::new(0., 0.),
        }
    }
}

/// A full rotation's worth of spokes, the shared image that the receive
/// pipeline writes and the trackers read and clear.
#[derive(Debug, Clone)]
pub(crate) struct HistorySpokes {
    pub spokes: Vec<HistorySpoke>,
    spoke_len: usize,
}

impl HistorySpokes {
    pub fn new(spokes: usize, spoke_len: usize) -> Self {
        Self {
            spokes: (0..spokes).map(|_| HistorySpoke::new(spoke_len)).collect(),
            spoke_len,
        }
    }

    pub fn mod_spokes(&self, angle: i32) -> usize {
        angle.rem_euclid(self.spokes.len() as i32) as usize
    }

    pub fn spoke_time(&self, angle: i32) -> u64 {
        self.spokes[self.mod_spokes(angle)].time
    }

    pub fn spoke_pos(&self, angle: i32) -> GeoPosition {
        self.spokes[self.mod_spokes(angle)].pos
    }

    pub fn spoke_len(&self) -> usize {
        self.spoke_len
    }

    /// The raw bitfield of one cell; out-of-range cells read as empty.
    pub fn pixel(&self, ang: i32, rad: i32) -> HistoryPixel {
        if rad < 0 || rad >= self.spoke_len as i32 {
            return HistoryPixel::empty();
        }
        self.spokes[self.mod_spokes(ang)]
            .sweep
            .get(rad as usize)
            .copied()
            .unwrap_or(HistoryPixel::empty())
    }

    /// Whether the cell at (ang, rad) is "on" under the given Doppler state.
    pub fn pix(&self, doppler: &Doppler, ang: i32, rad: i32) -> bool {
        if rad <= 0 || rad >= self.spoke_len as i32 {
            return false;
        }
        let pixel = self.spokes[self.mod_spokes(ang)]
            .sweep
            .get(rad as usize)
            .copied()
            .unwrap_or(HistoryPixel::empty());

        doppler.matches_pixel(
            pixel.contains(HistoryPixel::TARGET),
            pixel.contains(HistoryPixel::BACKUP),
            pixel.contains(HistoryPixel::APPROACHING),
            pixel.contains(HistoryPixel::RECEDING),
        )
    }

    /// Check that the blob at (ang, rad) has a contour of at least the
    /// minimum length. (ang, rad) must be on the contour of the blob.
    ///
    /// If the blob closes early it is noise; its pixels are masked back to
    /// the sticky bit so repeated scans do not examine it again this
    /// rotation.
    fn multi_pix(&mut self, doppler: &Doppler, ang: i32, rad: i32) -> bool {
        if !self.pix(doppler, ang, rad) {
            return false;
        }
        let start = Polar::new(ang, rad, 0);
        if start.r >= self.spoke_len as i32 || start.r < 3 {
            return false;
        }

        let mut current = start;
        let mut max_angle = current;
        let mut min_angle = current;
        let mut max_r = current;
        let mut min_r = current;
        let mut count = 0;
        let mut found = false;

        // first find the orientation of border point p
        let mut index = 0;
        for i in 0..4 {
            index = i;
            if !self.pix(
                doppler,
                current.angle + FOUR_DIRECTIONS[index].angle,
                current.r + FOUR_DIRECTIONS[index].r,
            ) {
                found = true;
                break;
            }
        }
        if !found {
            return false; // (ang, rad) is not on the contour
        }
        index = (index + 1) % 4;

        while current.r != start.r || current.angle != start.angle || count == 0 {
            // try all translations to find the next point, starting with the
            // "left most" translation relative to the previous one
            index = (index + 3) % 4; // turn left when possible
            found = false;
            for _ in 0..4 {
                if self.pix(
                    doppler,
                    current.angle + FOUR_DIRECTIONS[index].angle,
                    current.r + FOUR_DIRECTIONS[index].r,
                ) {
                    found = true;
                    break;
                }
                index = (index + 1) % 4;
            }
            if !found {
                return false; // single pixel blob
            }
            current.angle += FOUR_DIRECTIONS[index].angle;
            current.r += FOUR_DIRECTIONS[index].r;
            if count >= MIN_CONTOUR_LENGTH {
                return true;
            }
            count += 1;
            if current.angle > max_angle.angle {
                max_angle = current;
            }
            if current.angle < min_angle.angle {
                min_angle = current;
            }
            if current.r > max_r.r {
                max_r = current;
            }
            if current.r < min_r.r {
                min_r = current;
            }
        }

        // contour closed before reaching the minimum length: erase this blob
        // so we do not have to check it again
        if min_angle.angle < 0 {
            min_angle.angle += self.spokes.len() as i32;
            max_angle.angle += self.spokes.len() as i32;
        }
        for a in min_angle.angle..=max_angle.angle {
            let a = self.mod_spokes(a);
            for r in min_r.r..=max_r.r {
                if let Some(pixel) = self.spokes[a].sweep.get_mut(r as usize) {
                    *pixel = pixel.intersection(HistoryPixel::BACKUP);
                }
            }
        }
        false
    }

    /// Move pol to the contour of the blob it is inside of.
    fn find_contour_from_inside(&mut self, doppler: &Doppler, pol: &mut Polar) -> bool {
        let mut ang = pol.angle;
        let rad = pol.r;
        let mut limit = self.spokes.len() as i32;

        if rad >= self.spoke_len as i32 || rad < 3 {
            return false;
        }
        if !self.pix(doppler, ang, rad) {
            return false;
        }
        while limit >= 0 && self.pix(doppler, ang, rad) {
            ang -= 1;
            limit -= 1;
        }
        ang += 1;
        pol.angle = ang;

        self.multi_pix(doppler, ang, rad)
    }

    fn pix2(&mut self, doppler: &Doppler, pol: &mut Polar, a: i32, r: i32) -> bool {
        if r < self.spoke_len as i32 - 1 && self.multi_pix(doppler, a, r) {
            pol.angle = a;
            pol.r = r;
            return true;
        }
        false
    }

    /// Search for a blob along an expanding square pattern around pol.
    /// `dist` is the search radius in radial pixels; the angular width of
    /// each ring is scaled by the radius so that the physical ring spacing
    /// stays roughly uniform. Moves pol to the first hit.
    fn find_nearest_contour(&mut self, doppler: &Doppler, pol: &mut Polar, dist: i32) -> bool {
        let a = pol.angle;
        let r = pol.r;
        let distance = max(dist, 2);
        let factor: f64 = self.spokes.len() as f64 / 2.0 / PI;

        for j in 1..=distance {
            let dist_r = j;
            let dist_a = max((factor / r as f64 * j as f64) as i32, 1);
            for i in 0..=dist_a {
                // "upper" side
                if self.pix2(doppler, pol, a - i, r + dist_r) {
                    return true;
                }
                if self.pix2(doppler, pol, a + i, r + dist_r) {
                    return true;
                }
            }
            for i in 0..dist_r {
                // "right hand" side
                if self.pix2(doppler, pol, a + dist_a, r + i) {
                    return true;
                }
                if self.pix2(doppler, pol, a + dist_a, r - i) {
                    return true;
                }
            }
            for i in 0..=dist_a {
                // "lower" side
                if self.pix2(doppler, pol, a - i, r - dist_r) {
                    return true;
                }
                if self.pix2(doppler, pol, a + i, r - dist_r) {
                    return true;
                }
            }
            for i in 0..dist_r {
                // "left hand" side
                if self.pix2(doppler, pol, a - dist_a, r + i) {
                    return true;
                }
                if self.pix2(doppler, pol, a - dist_a, r - i) {
                    return true;
                }
            }
        }
        false
    }

    /// Trace the boundary of the blob whose contour passes through pol,
    /// clockwise. Returns the contour and the midpoint of its extents, with
    /// the midpoint's spoke capture time.
    fn get_contour(&mut self, doppler: &Doppler, pol: Polar) -> Result<(Contour, Polar), TrackError> {
        let mut pol = pol;
        let start = pol;
        let mut current = start;
        let mut count: usize = 0;

        let mut contour = Contour::new();
        contour.max_r = current.r;
        contour.max_angle = current.angle;
        contour.min_r = current.r;
        contour.min_angle = current.angle;

        if start.r >= self.spoke_len as i32 {
            return Err(TrackError::RangeTooHigh);
        }
        if start.r < 4 {
            return Err(TrackError::RangeTooLow);
        }
        if !self.pix(doppler, start.angle, start.r) {
            return Err(TrackError::NoEchoAtStart);
        }

        // first find the orientation of border point p
        let mut succes = false;
        let mut index = 0;
        for i in 0..4 {
            index = i;
            if !self.pix(
                doppler,
                current.angle + FOUR_DIRECTIONS[index].angle,
                current.r + FOUR_DIRECTIONS[index].r,
            ) {
                succes = true;
                break;
            }
        }
        if !succes {
            return Err(TrackError::StartPointNotOnContour);
        }
        index = (index + 1) % 4; // determines starting direction

        while current.r != start.r || current.angle != start.angle || count == 0 {
            // try all translations to find the next point, starting with the
            // "left most" translation relative to the previous one
            index = (index + 3) % 4; // turn left when possible
            succes = false;
            let mut next = current;
            for _ in 0..4 {
                next = current + FOUR_DIRECTIONS[index];
                if self.pix(doppler, next.angle, next.r) {
                    succes = true;
                    break;
                }
                index = (index + 1) % 4;
            }
            if !succes {
                return Err(TrackError::BrokenContour);
            }
            current = next;
            if count < MAX_CONTOUR_LENGTH - 2 {
                contour.points.push(current);
            } else if count == MAX_CONTOUR_LENGTH - 2 {
                // very long boundary: close the polyline back to the start;
                // such blobs are rejected by the length test, not traced in
                // full
                contour.points.push(start);
                current = start;
            }
            if count < MAX_CONTOUR_LENGTH - 1 {
                count += 1;
            }
            if current.angle > contour.max_angle {
                contour.max_angle = current.angle;
            }
            if current.angle < contour.min_angle {
                contour.min_angle = current.angle;
            }
            if current.r > contour.max_r {
                contour.max_r = current.r;
            }
            if current.r < contour.min_r {
                contour.min_r = current.r;
            }
        }
        contour.length = contour.points.len() as i32;

        if contour.min_angle < 0 {
            // the blob straddles the zero bearing
            contour.min_angle += self.spokes.len() as i32;
            contour.max_angle += self.spokes.len() as i32;
        }
        if contour.max_r >= self.spoke_len as i32 || contour.min_r >= self.spoke_len as i32 {
            return Err(TrackError::RangeTooHigh);
        }
        if contour.max_r < 2 || contour.min_r < 2 {
            return Err(TrackError::RangeTooLow);
        }

        pol.angle = self.mod_spokes((contour.max_angle + contour.min_angle) / 2) as i32;
        pol.r = (contour.max_r + contour.min_r) / 2;
        pol.time = self.spoke_time(pol.angle);
        contour.position = pol;

        if !self.spoke_pos(pol.angle).is_valid() {
            log::warn!(
                "capture fix {} at spoke {} is invalid, echo dropped",
                self.spoke_pos(pol.angle),
                pol.angle
            );
            return Err(TrackError::InvalidCaptureFix);
        }

        Ok((contour, pol))
    }

    /// Locate the blob nearest to pol and trace its full contour. If pol is
    /// already on a blob the blob is entered from the inside; otherwise the
    /// expanding search pattern is used up to `dist1` radial pixels.
    pub fn get_target(
        &mut self,
        doppler: &Doppler,
        pol: Polar,
        dist1: i32,
    ) -> Result<(Contour, Polar), TrackError> {
        let mut pol = pol;
        let dist = min(dist1, pol.r - 5);

        let contour_found = if self.pix(doppler, pol.angle, pol.r) {
            self.find_contour_from_inside(doppler, &mut pol)
        } else {
            self.find_nearest_contour(doppler, &mut pol, dist)
        };
        if !contour_found {
            return Err(TrackError::NoContourFound);
        }
        self.get_contour(doppler, pol)
    }

    /// Reset the pixels of a found blob, plus a separation margin, so the
    /// blob is not found again in the same rotation. Cells are masked back
    /// to the sticky bit. For large blobs close to the sensor the radial
    /// shadow behind the blob is blanked as well.
    pub fn reset_pixels(&mut self, contour: &Contour, pixels_per_meter: f64) {
        const DISTANCE_BETWEEN_TARGETS: i32 = 30;
        const SHADOW_MARGIN: i32 = 5;
        const TARGET_DISTANCE_FOR_BLANKING_SHADOW: f64 = 6000.; // 6 km

        let spoke_len = self.spoke_len as i32;
        for a in contour.min_angle - DISTANCE_BETWEEN_TARGETS
            ..=contour.max_angle + DISTANCE_BETWEEN_TARGETS
        {
            let a = self.mod_spokes(a);
            for r in max(contour.min_r - DISTANCE_BETWEEN_TARGETS, 0)
                ..=min(contour.max_r + DISTANCE_BETWEEN_TARGETS, spoke_len - 1)
            {
                let pixel = &mut self.spokes[a].sweep[r as usize];
                *pixel = pixel.intersection(HistoryPixel::BACKUP);
            }
        }

        let distance_to_radar = contour.position.r as f64 / pixels_per_meter;
        if contour.length > 20 && distance_to_radar < TARGET_DISTANCE_FOR_BLANKING_SHADOW {
            let mut max_angle = contour.max_angle;
            if contour.min_angle - SHADOW_MARGIN > contour.max_angle + SHADOW_MARGIN {
                max_angle += self.spokes.len() as i32;
            }
            for a in contour.min_angle - SHADOW_MARGIN..=max_angle + SHADOW_MARGIN {
                let a = self.mod_spokes(a);
                for r in contour.max_r..=min(4 * contour.max_r, spoke_len - 1) {
                    let pixel = &mut self.spokes[a].sweep[r as usize];
                    *pixel = pixel.intersection(HistoryPixel::BACKUP);
                }
            }
        }

        // Remember the traced boundary; it is painted into the output data
        // on the next sweep.
        for p in &contour.points {
            let a = self.mod_spokes(p.angle);
            if let Some(pixel) = self.spokes[a].sweep.get_mut(p.r as usize) {
                pixel.insert(HistoryPixel::CONTOUR);
            }
        }
    }

    /// True when the blob at (ang, rad) passes the minimum-length test.
    /// Exposed for the scan that acquires new Doppler targets.
    pub fn scan_pix(&mut self, doppler: &Doppler, ang: i32, rad: i32) -> bool {
        self.multi_pix(doppler, ang, rad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPOKES: usize = 256;
    const SPOKE_LEN: usize = 256;

    fn image() -> HistorySpokes {
        let mut history = HistorySpokes::new(SPOKES, SPOKE_LEN);
        for spoke in history.spokes.iter_mut() {
            spoke.time = 1000;
            spoke.pos = GeoPosition::new(53., 5.);
        }
        history
    }

    fn paint(history: &mut HistorySpokes, angles: std::ops::RangeInclusive<i32>, radii: std::ops::RangeInclusive<i32>) {
        for a in angles {
            let a = history.mod_spokes(a);
            for r in radii.clone() {
                history.spokes[a].sweep[r as usize] = HistoryPixel::INITIAL;
            }
        }
    }

    #[test]
    fn trace_blob_extents_and_closure() {
        let mut history = image();
        paint(&mut history, 10..=14, 50..=55);

        let (contour, pol) = history
            .get_contour(&Doppler::Any, Polar::new(10, 50, 0))
            .unwrap();
        assert_eq!(contour.min_angle, 10);
        assert_eq!(contour.max_angle, 14);
        assert_eq!(contour.min_r, 50);
        assert_eq!(contour.max_r, 55);
        assert_eq!(pol.angle, 12);
        assert_eq!(pol.r, 52);
        assert_eq!(pol.time, 1000);

        // the walk is closed: the last point is the start, each step is one
        // cell, and the extents bound every point
        let first = contour.points.first().unwrap();
        let last = contour.points.last().unwrap();
        assert_eq!((last.angle, last.r), (10, 50));
        assert_eq!((first.angle - last.angle).abs() + (first.r - last.r).abs(), 1);
        for w in contour.points.windows(2) {
            let step = (w[1].angle - w[0].angle).abs() + (w[1].r - w[0].r).abs();
            assert_eq!(step, 1);
        }
        for p in &contour.points {
            assert!(p.angle >= 10 && p.angle <= 14);
            assert!(p.r >= 50 && p.r <= 55);
        }
    }

    #[test]
    fn trace_errors() {
        let mut history = image();
        paint(&mut history, 10..=14, 50..=55);

        assert_eq!(
            history
                .get_contour(&Doppler::Any, Polar::new(10, 300, 0))
                .unwrap_err(),
            TrackError::RangeTooHigh
        );
        assert_eq!(
            history
                .get_contour(&Doppler::Any, Polar::new(10, 2, 0))
                .unwrap_err(),
            TrackError::RangeTooLow
        );
        assert_eq!(
            history
                .get_contour(&Doppler::Any, Polar::new(100, 100, 0))
                .unwrap_err(),
            TrackError::NoEchoAtStart
        );
        // interior cell: every neighbor is on
        assert_eq!(
            history
                .get_contour(&Doppler::Any, Polar::new(12, 52, 0))
                .unwrap_err(),
            TrackError::StartPointNotOnContour
        );
    }

    #[test]
    fn blob_straddling_zero_bearing() {
        let mut history = image();
        paint(&mut history, -2..=2, 50..=55);

        let (contour, pol) = history
            .get_contour(&Doppler::Any, Polar::new(0, 50, 0))
            .unwrap();
        assert_eq!(contour.min_angle, 254);
        assert_eq!(contour.max_angle, 258);
        assert_eq!(pol.angle, 0);
    }

    #[test]
    fn noise_blob_is_cleared() {
        let mut history = image();
        // two cells: closes well below the minimum contour length
        paint(&mut history, 30..=30, 80..=81);

        assert!(!history.scan_pix(&Doppler::Any, 30, 80));
        // the above-threshold bit is gone, the sticky bit survives
        assert!(!history.pix(&Doppler::Any, 30, 80));
        assert!(history.pix(&Doppler::AnyPlus, 30, 80));
    }

    #[test]
    fn nearest_blob_found_within_pattern() {
        let mut history = image();
        paint(&mut history, 40..=44, 60..=64);

        let mut pol = Polar::new(30, 62, 0);
        assert!(history.find_nearest_contour(&Doppler::Any, &mut pol, 40));
        assert!(history.pix(&Doppler::Any, pol.angle, pol.r));
        let (contour, _) = history.get_contour(&Doppler::Any, pol).unwrap();
        assert!(contour.length >= MIN_CONTOUR_LENGTH as i32);
    }

    #[test]
    fn nearest_blob_not_found_beyond_pattern() {
        let mut history = image();
        paint(&mut history, 40..=44, 150..=154);

        let mut pol = Polar::new(40, 60, 0);
        assert!(!history.find_nearest_contour(&Doppler::Any, &mut pol, 10));
    }

    #[test]
    fn doppler_state_selects_pixels() {
        let mut history = image();
        paint(&mut history, 10..=14, 50..=55);
        for a in 10..=14 {
            for r in 50..=55 {
                history.spokes[a].sweep[r as usize].insert(HistoryPixel::APPROACHING);
            }
        }
        assert!(history.pix(&Doppler::Approaching, 12, 52));
        assert!(!history.pix(&Doppler::Receding, 12, 52));
        assert!(history.pix(&Doppler::AnyDoppler, 12, 52));
        assert!(!history.pix(&Doppler::NoDoppler, 12, 52));

        let (contour, _) = history
            .get_contour(&Doppler::Approaching, Polar::new(10, 50, 0))
            .unwrap();
        assert!(contour.length > 0);
    }

    #[test]
    fn reset_pixels_clears_blob_and_marks_contour() {
        let mut history = image();
        paint(&mut history, 40..=44, 60..=64);
        let (contour, _) = history
            .get_contour(&Doppler::Any, Polar::new(40, 60, 0))
            .unwrap();
        history.reset_pixels(&contour, 0.5);

        assert!(!history.pix(&Doppler::Any, 42, 62));
        assert!(history.pix(&Doppler::AnyPlus, 42, 62));
        // the traced boundary is remembered for the display overlay
        let p = contour.points.first().unwrap();
        let a = history.mod_spokes(p.angle);
        assert!(history.spokes[a].sweep[p.r as usize].contains(HistoryPixel::CONTOUR));
    }
}
