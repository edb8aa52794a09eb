use std::cmp::max;
use std::f64::consts::PI;
use strum::EnumIter;

use crate::contour::{Contour, MAX_CONTOUR_LENGTH_USED};
use crate::doppler::Doppler;
use crate::geo::{
    meters_per_degree_longitude, ExtendedPosition, GeoPosition, METERS_PER_DEGREE_LATITUDE,
};
use crate::history::{HistoryPixel, HistorySpokes};
use crate::kalman::{KalmanFilter, LocalPosition};
use crate::polar::Polar;
use crate::setup::TargetSetup;
use crate::TrackError;

/// First status reported to the outbound message encoder.
pub(crate) const STATUS_TO_OUTPUT: u32 = 5;

/// Above this status the small-and-fast velocity override no longer applies.
const FORCED_POSITION_STATUS: u32 = 8;

/// Number of rotations a target can be missed before it is set to lost.
pub(crate) const MAX_LOST_COUNT: i32 = 12;

// Smoothing weight of the running average contour length.
const WEIGHT_FACTOR: f64 = 0.1;

/// Track confidence. The counter is the number of confirmed fixes, starting
/// at zero on acquisition and incrementing on every fix; `Lost` is terminal
/// and makes the target eligible for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    Lost,
    Tracked(u32),
}

impl TargetStatus {
    /// Lost sorts below every tracked status.
    pub(crate) fn rank(&self) -> i64 {
        match self {
            TargetStatus::Lost => -1,
            TargetStatus::Tracked(n) => *n as i64,
        }
    }

    fn advance(&mut self) {
        if let TargetStatus::Tracked(n) = self {
            *n = n.saturating_add(1);
        }
    }

    pub(crate) fn at_least(&self, n: u32) -> bool {
        matches!(self, TargetStatus::Tracked(m) if *m >= n)
    }
}

// Each target is looked for up to three times per rotation, with a larger
// search tolerance on every following pass.
#[derive(Debug, Clone, Copy, PartialEq, EnumIter)]
pub(crate) enum Pass {
    First,
    Second,
    Third,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RefreshState {
    NotFound,
    Found,
    OutOfScope,
}

/// One tracked contact: its lifecycle status, last confirmed contour,
/// Doppler classification, motion estimator and the per-rotation refresh
/// bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct ArpaTarget {
    pub status: TargetStatus,
    pub id: u32,
    pub position: ExtendedPosition,
    pub course: f64,
    pub doppler: Doppler,
    pub automatic: bool,
    pub refreshed: RefreshState,
    pub contour: Contour,
    /// Sensor fix the contour's polars are relative to.
    pub radar_pos: GeoPosition,
    /// Radar serving this target, re-resolved every refresh.
    pub serving_radar: usize,
    pub small_fast: bool,

    kalman: KalmanFilter,
    average_contour_length: i32,
    lost_count: i32,
    refresh_time: u64,
    expected: Polar,
    total_pix: u32,
    approaching_pix: u32,
    receding_pix: u32,
    have_doppler: bool,
}

impl ArpaTarget {
    pub fn new(
        position: ExtendedPosition,
        spokes: usize,
        doppler: Doppler,
        automatic: bool,
        have_doppler: bool,
    ) -> Self {
        Self {
            status: TargetStatus::Tracked(0),
            id: 0,
            position,
            course: 0.,
            doppler,
            automatic,
            refreshed: RefreshState::NotFound,
            contour: Contour::new(),
            radar_pos: GeoPosition::new(0., 0.),
            serving_radar: 0,
            small_fast: false,
            kalman: KalmanFilter::new(spokes),
            average_contour_length: 0,
            lost_count: 0,
            refresh_time: 0,
            expected: Polar::default(),
            total_pix: 0,
            approaching_pix: 0,
            receding_pix: 0,
            have_doppler,
        }
    }

    /// One refresh attempt: predict where the target should be, search the
    /// image there, and on success fuse the measurement. `dist` is the
    /// search radius in radial pixels for this pass.
    pub fn refresh(
        &mut self,
        setup: &TargetSetup,
        history: &mut HistorySpokes,
        own_pos: &GeoPosition,
        dist: i32,
        pass: Pass,
    ) -> Result<(), TrackError> {
        let prev_refresh = self.refresh_time;
        if self.status == TargetStatus::Lost {
            self.refreshed = RefreshState::OutOfScope;
            return Err(TrackError::Lost);
        }
        if self.refreshed != RefreshState::NotFound {
            // already resolved earlier in this rotation
            return Err(TrackError::AlreadyRefreshed);
        }

        let own_pos = ExtendedPosition::new(*own_pos, 0., 0., 0, 0., 0.);
        self.serving_radar = setup.serving_radar(&self.position.pos);

        let mut pol = setup.pos2polar(&self.position, &own_pos);
        let alfa0 = pol.angle;
        let r0 = pol.r;

        // the capture time of a spoke a scan margin ahead of the target;
        // once that spoke has been written, the target's next image is in
        // the buffer
        let angle_time = history.spoke_time(pol.angle + setup.scan_margin());
        if angle_time < (self.refresh_time + setup.rotation_period()).saturating_sub(100) {
            // 100 ms margin on the rotation period; the next image of the
            // target is not there yet
            self.refreshed = RefreshState::OutOfScope;
            return Err(TrackError::WaitForRefresh);
        }

        self.refresh_time = history.spoke_time(pol.angle);
        let prev_position = self.position.clone();

        // Local-plane reference for this refresh: the sensor fix recorded
        // when the spoke nearest the predicted bearing was captured. The own
        // ship may have moved between that capture and the current fix.
        let mut ref_pos = own_pos.clone();
        let capture_fix = history.spoke_pos(pol.angle);
        if self.refresh_time > 0 && capture_fix.is_valid() {
            ref_pos.pos = capture_fix;
        }

        // PREDICTION CYCLE

        log::debug!(
            "id={} predict status={:?} angle={} r={} contour={} pass={:?} pos={}",
            self.id,
            self.status,
            pol.angle,
            pol.r,
            self.contour.length,
            pass,
            self.position.pos
        );

        let delta_t = if self.refresh_time >= prev_position.time
            && self.status != TargetStatus::Tracked(0)
        {
            (self.refresh_time - prev_position.time) as f64 / 1000. // in seconds
        } else {
            0.
        };

        if !self.position.pos.is_valid() {
            log::warn!("target {} has an unlikely position {}", self.id, self.position.pos);
            self.set_status_lost();
            self.refreshed = RefreshState::OutOfScope;
            return Err(TrackError::Lost);
        }

        let mut x_local = LocalPosition::new(
            (self.position.pos.lat - ref_pos.pos.lat) * METERS_PER_DEGREE_LATITUDE,
            (self.position.pos.lon - ref_pos.pos.lon)
                * meters_per_degree_longitude(&ref_pos.pos.lat),
            self.position.dlat_dt,
            self.position.dlon_dt,
        );

        self.kalman.predict(&mut x_local, delta_t);

        pol.angle = setup.mod_spokes(
            (f64::atan2(x_local.lon, x_local.lat) * setup.spokes_f64 / (2. * PI)) as i32,
        );
        pol.r = ((x_local.lat * x_local.lat + x_local.lon * x_local.lon).sqrt()
            * setup.pixels_per_meter) as i32;

        log::trace!(
            "id={} prediction pass={:?} status={:?} angle={}.{} r={}.{} speed={} doppler={:?} lost_count={}",
            self.id,
            pass,
            self.status,
            alfa0,
            pol.angle,
            r0,
            pol.r,
            self.position.speed_kn,
            self.doppler,
            self.lost_count
        );
        if pol.r >= setup.spoke_len || pol.r <= 0 {
            // the target has left the sensor's coverage
            log::debug!("id={} prediction out of range, r={}", self.id, pol.r);
            self.set_status_lost();
            self.refreshed = RefreshState::OutOfScope;
            return Err(TrackError::Lost);
        }
        self.expected = pol; // save the expected polar position

        // MEASUREMENT CYCLE

        let mut dist1 = dist;
        if pass == Pass::Third {
            if self.status.rank() <= 2 || self.position.speed_kn > 15. {
                dist1 *= 2;
            }
            self.doppler = Doppler::Any; // not critical on the last pass
        }

        let mut failure = TrackError::NoContourFound;
        let mut found = match history.get_target(&self.doppler, pol, dist1) {
            Ok(hit) => Some(hit),
            Err(e) => {
                failure = e;
                None
            }
        };

        if let Some((contour, measured)) = &found {
            log::debug!(
                "id={} found angle={} r={} contour={} pass={:?} doppler={:?}",
                self.id,
                measured.angle,
                measured.r,
                contour.length,
                pass,
                self.doppler
            );

            // count the pixels over the whole echo, not just the slice that
            // matches a narrow Doppler state, then evaluate a classification
            // change
            if self.doppler != Doppler::Any {
                match history.get_target(&Doppler::Any, *measured, dist1) {
                    Ok((any_contour, _)) => self.count_pixels(history, &any_contour),
                    Err(_) => self.count_pixels(history, contour),
                }
            } else {
                self.count_pixels(history, contour);
            }
            self.state_transition();

            if self.average_contour_length != 0
                && (contour.length < self.average_contour_length / 2
                    || contour.length > self.average_contour_length * 2)
                && pass != Pass::Third
            {
                // does not match the established echo size; search again on
                // the next pass, accept whatever is there on the last
                log::debug!(
                    "id={} reject average_contour_length={} contour={}",
                    self.id,
                    self.average_contour_length,
                    contour.length
                );
                failure = TrackError::ContourLengthRejected;
            }
        }
        if failure == TrackError::ContourLengthRejected {
            found = None;
        }

        if let Some((contour, _)) = &found {
            history.reset_pixels(contour, setup.pixels_per_meter);
            if contour.length >= MAX_CONTOUR_LENGTH_USED as i32 - 1 {
                // interference or landmass. The pixels have been reset, so
                // it will not be found again this rotation.
                log::debug!(
                    "id={} contour={} too long, treated as clutter",
                    self.id,
                    contour.length
                );
                failure = TrackError::ContourTooLong;
            }
        }
        if failure == TrackError::ContourTooLong {
            found = None;
        }

        match found {
            Some((contour, measured)) => self.refresh_found(
                setup,
                history,
                ref_pos,
                x_local,
                contour,
                measured,
                prev_position,
                alfa0,
                r0,
            ),
            None => self.refresh_not_found(pol, pass, prev_refresh, prev_position, failure),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn refresh_found(
        &mut self,
        setup: &TargetSetup,
        history: &HistorySpokes,
        ref_pos: ExtendedPosition,
        mut x_local: LocalPosition,
        contour: Contour,
        measured: Polar,
        prev_position: ExtendedPosition,
        alfa0: i32,
        r0: i32,
    ) -> Result<(), TrackError> {
        self.lost_count = 0;

        // own-ship fix at the time the target's spoke was captured
        let mut p_own = ExtendedPosition::empty();
        p_own.pos = history.spoke_pos(measured.angle);
        self.radar_pos = p_own.pos;

        if self.status == TargetStatus::Tracked(0) {
            // first fix: snap the target to the measured position
            self.position = setup.polar2pos(&measured, &p_own);
            self.position.dlat_dt = 0.;
            self.position.dlon_dt = 0.;
            self.position.sd_speed_kn = 0.;
            self.expected = measured;
            log::debug!("id={} bootstrapped at {}", self.id, self.position.pos);
        }
        self.status.advance();

        // fuse the measurement once speed and course are being estimated
        if self.status.at_least(2) {
            self.kalman.update_p();
            self.kalman
                .set_measurement(&measured, &mut x_local, &self.expected, setup.pixels_per_meter);
        }

        self.position.time = measured.time;

        if self.status != TargetStatus::Tracked(1) {
            // on the first fix the position stays at the measurement
            self.position.pos.lat = ref_pos.pos.lat + x_local.lat / METERS_PER_DEGREE_LATITUDE;
            self.position.pos.lon =
                ref_pos.pos.lon + x_local.lon / meters_per_degree_longitude(&ref_pos.pos.lat);
            self.position.dlat_dt = x_local.dlat_dt; // meters / sec
            self.position.dlon_dt = x_local.dlon_dt; // meters / sec
            self.position.sd_speed_kn = x_local.sd_speed_m_s * 3600. / 1852.;
        }

        if self.status == TargetStatus::Tracked(2) {
            // decide whether this is a small and fast target: displacement
            // since the previous fix large relative to the blob's own extent
            let dist_angle = measured.angle - alfa0;
            let dist_r = measured.r - r0;
            let size_angle = max(setup.mod_spokes(contour.angular_width()), 1);
            let size_r = max(contour.radial_extent(), 1);
            let test = (dist_r as f64 / size_r as f64).abs()
                + (dist_angle as f64 / size_angle as f64).abs();
            self.small_fast = test > 2.;
            log::debug!(
                "id={} small_fast={} test={} dist_r={} size_r={} dist_angle={} size_angle={}",
                self.id,
                self.small_fast,
                test,
                dist_r,
                size_r,
                dist_angle,
                size_angle
            );
        }

        if self.small_fast
            && self.status.at_least(2)
            && !self.status.at_least(FORCED_POSITION_STATUS)
            && (!self.status.at_least(5) || self.position.speed_kn > 10.)
        {
            // Bypass the Kalman filter with a linear extrapolation from the
            // last two raw fixes; the filter takes too long to get up to
            // speed for small fast targets.
            let prev_pos = prev_position.pos;
            let new_pos = setup.polar2pos(&measured, &p_own).pos;
            let delta_t = measured.time.saturating_sub(prev_position.time);
            if delta_t > 1000 {
                // below one second the direct speed is unreliable due to
                // position jitter
                let d_lat_dt = ((new_pos.lat - prev_pos.lat) / delta_t as f64)
                    * METERS_PER_DEGREE_LATITUDE
                    * 1000.;
                let d_lon_dt = ((new_pos.lon - prev_pos.lon) / delta_t as f64)
                    * meters_per_degree_longitude(&new_pos.lat)
                    * 1000.;
                let factor: f64 = 0.8_f64.powf((self.status.rank() - 1) as f64);
                self.position.pos.lat += factor * (new_pos.lat - self.position.pos.lat);
                self.position.pos.lon += factor * (new_pos.lon - self.position.pos.lon);
                self.position.dlat_dt += factor * (d_lat_dt - self.position.dlat_dt);
                self.position.dlon_dt += factor * (d_lon_dt - self.position.dlon_dt);
                log::debug!(
                    "id={} forced position status={:?} d_lat_dt={} d_lon_dt={} delta_t={}",
                    self.id,
                    self.status,
                    d_lat_dt,
                    d_lon_dt,
                    delta_t
                );
            }
        }

        // refresh time becomes the capture time of the spoke the target was
        // found on
        self.refresh_time = self.position.time;

        let s1 = self.position.dlat_dt; // m per second
        let s2 = self.position.dlon_dt;
        self.position.speed_kn = (s1 * s1 + s2 * s2).sqrt() * 3600. / 1852.;
        self.course = f64::atan2(s2, s1).to_degrees();
        if self.course < 0. {
            self.course += 360.;
        }

        if contour.length != 0 {
            if self.average_contour_length == 0 {
                self.average_contour_length = contour.length;
            } else {
                self.average_contour_length += ((contour.length - self.average_contour_length)
                    as f64
                    * WEIGHT_FACTOR) as i32;
            }
        }

        log::debug!(
            "id={} fixed status={:?} angle={}.{} r={}.{} contour={} speed={} sd_speed={} doppler={:?}",
            self.id,
            self.status,
            alfa0,
            measured.angle,
            r0,
            measured.r,
            contour.length,
            self.position.speed_kn,
            self.position.sd_speed_kn,
            self.doppler
        );

        self.contour = contour;
        self.refreshed = RefreshState::Found;
        Ok(())
    }

    fn refresh_not_found(
        &mut self,
        pol: Polar,
        pass: Pass,
        prev_refresh: u64,
        prev_position: ExtendedPosition,
        failure: TrackError,
    ) -> Result<(), TrackError> {
        log::debug!(
            "id={} not found angle={} r={} pass={:?} lost_count={} status={:?}: {}",
            self.id,
            pol.angle,
            pol.r,
            pass,
            self.lost_count,
            self.status,
            failure
        );

        if pass != Pass::Third {
            // roll back the speculative state changes; the next pass retries
            // with a larger tolerance
            self.refresh_time = prev_refresh;
            self.position = prev_position;
        }

        if self.small_fast && pass == Pass::Second && self.status == TargetStatus::Tracked(2) {
            // small fast targets must be reacquired at a small distance or
            // they are presumed gone
            log::debug!("id={} small fast target lost", self.id);
            self.set_status_lost();
            self.refreshed = RefreshState::OutOfScope;
            return Err(TrackError::Lost);
        }

        // delete low status targets immediately when not found
        if (self.status.rank() <= 3 && pass == Pass::Third)
            || self.status == TargetStatus::Tracked(0)
        {
            log::debug!("id={} low status target lost", self.id);
            self.set_status_lost();
            self.refreshed = RefreshState::OutOfScope;
            return Err(TrackError::Lost);
        }

        if pass == Pass::Third {
            self.lost_count += 1;
            if self.lost_count > MAX_LOST_COUNT {
                log::debug!("id={} missed {} rotations, lost", self.id, self.lost_count);
                self.set_status_lost();
                self.refreshed = RefreshState::OutOfScope;
                return Err(TrackError::Lost);
            }
        }
        self.refreshed = RefreshState::NotFound;
        Err(failure)
    }

    /// Count the pixels of the blob, and how many of them carry each Doppler
    /// bit. Moves outward from every boundary cell until the echo ends; on
    /// the inside this sweeps the whole blob, on the outside it stops
    /// immediately, so outside cells are counted twice.
    fn count_pixels(&mut self, history: &HistorySpokes, contour: &Contour) {
        self.total_pix = 0;
        self.approaching_pix = 0;
        self.receding_pix = 0;
        for p in &contour.points {
            for radius in p.r..history.spoke_len() as i32 {
                let pixel = history.pixel(p.angle, radius);
                if !pixel.contains(HistoryPixel::TARGET) {
                    break;
                }
                self.total_pix += 1;
                self.approaching_pix += pixel.contains(HistoryPixel::APPROACHING) as u32;
                self.receding_pix += pixel.contains(HistoryPixel::RECEDING) as u32;
            }
        }
    }

    /// Evaluate a Doppler classification change after a confirmed fix.
    fn state_transition(&mut self) {
        if !self.have_doppler || self.doppler == Doppler::AnyPlus {
            return;
        }
        let new = self
            .doppler
            .transition(self.total_pix, self.approaching_pix, self.receding_pix);
        if new != self.doppler {
            log::debug!(
                "target {} Doppler state changed from {:?} to {:?}",
                self.id,
                self.doppler,
                new
            );
            self.doppler = new;
        }
    }

    /// Forget the stored contour, typically because the image scale changed
    /// and the stored polars no longer mean anything.
    pub fn clear_contour(&mut self) {
        self.contour = Contour::new();
        self.average_contour_length = 0;
    }

    pub fn set_status_lost(&mut self) {
        self.contour = Contour::new();
        self.lost_count = 0;
        self.kalman.reset_filter();
        self.status = TargetStatus::Lost;
        self.automatic = false;
        self.refresh_time = 0;
        self.course = 0.;
        self.position.dlat_dt = 0.;
        self.position.dlon_dt = 0.;
        self.position.speed_kn = 0.;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ordering_and_advance() {
        let mut status = TargetStatus::Tracked(0);
        assert_eq!(status.rank(), 0);
        status.advance();
        status.advance();
        assert_eq!(status, TargetStatus::Tracked(2));
        assert!(status.at_least(2));
        assert!(!status.at_least(3));
        assert!(TargetStatus::Lost.rank() < TargetStatus::Tracked(0).rank());

        let mut lost = TargetStatus::Lost;
        lost.advance();
        assert_eq!(lost, TargetStatus::Lost);
    }

    #[test]
    fn lost_target_holds_no_contour() {
        let mut target = ArpaTarget::new(
            ExtendedPosition::empty(),
            2048,
            Doppler::Any,
            true,
            false,
        );
        target.contour.length = 30;
        target.contour.points.push(Polar::new(1, 1, 0));
        target.position.speed_kn = 4.;
        target.set_status_lost();
        assert_eq!(target.status, TargetStatus::Lost);
        assert_eq!(target.contour.length, 0);
        assert!(target.contour.points.is_empty());
        assert_eq!(target.position.speed_kn, 0.);
        assert!(!target.automatic);
    }
}
