use serde::Serialize;
use strum::IntoEnumIterator;

use crate::doppler::Doppler;
use crate::geo::{
    meters_per_degree_longitude, ExtendedPosition, GeoPosition, METERS_PER_DEGREE_LATITUDE,
};
use crate::history::{HistoryPixel, HistorySpokes};
use crate::polar::Polar;
use crate::setup::TargetSetup;
use crate::target::{ArpaTarget, Pass, RefreshState, TargetStatus, STATUS_TO_OUTPUT};
use crate::TrackError;

const MAX_DETECTION_SPEED_KN: f64 = 40.;
const KN_TO_MS: f64 = 1852. / 3600.;

// Target ids wrap below this; ids from different radars are offset by it so
// they cannot collide.
const MAX_TARGET_ID: u32 = 100_000;

// A bearing is rescanned for new Doppler targets at most once per rotation.
const DOPPLER_RESCAN_MS: u64 = 1000;

// Search radius around a newly acquired echo, on top of the blob size.
const ACQUIRE_SEARCH_RADIUS: i32 = 5;

const MAX_DELETE_DISTANCE_M: f64 = 1000.;

/// How the receive pipeline encodes a spoke's intensity bytes: the lowest
/// value that counts as an echo, the values reserved for Doppler returns,
/// and the value used to paint traced target boundaries back into the
/// display stream.
#[derive(Debug, Clone)]
pub struct Legend {
    pub strong_return: u8,
    pub doppler_approaching: u8,
    pub doppler_receding: u8,
    pub border: u8,
}

/// One spoke from the receive pipeline. `bearing` is the stabilized bearing
/// when the sensor provides one, `angle` the raw rotation angle. `range` is
/// the distance in meters covered by `data`, and `pos` the sensor fix at
/// capture time.
#[derive(Debug, Clone)]
pub struct Spoke {
    pub angle: u32,
    pub bearing: Option<u32>,
    pub range: u32,
    pub time: u64,
    pub pos: Option<GeoPosition>,
    pub data: Vec<u8>,
}

/// The per-rotation record handed to the outbound message encoder for every
/// established target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub id: u32,
    pub range_m: f64,
    pub bearing_deg: f64,
    pub speed_kn: f64,
    pub course_deg: f64,
    pub doppler: Doppler,
    pub automatic: bool,
}

/// A target's traced boundary for the display overlay, anchored to the
/// sensor fix it was captured against.
#[derive(Debug, Clone)]
pub struct TargetContour {
    pub id: u32,
    pub points: Vec<Polar>,
    pub radar_fix: GeoPosition,
}

/// The target registry: owns the polar history image and the collection of
/// tracked targets, and runs the per-rotation refresh sweep.
#[derive(Debug, Clone)]
pub struct Arpa {
    setup: TargetSetup,
    history: HistorySpokes,
    targets: Vec<ArpaTarget>,
    next_target_id: u32,
    /// Last Doppler scan time per bearing.
    doppler_scan_time: Vec<u64>,
    own_position: Option<GeoPosition>,
    doppler_acquisition: bool,
}

impl Arpa {
    pub fn new(radar_id: usize, spokes: usize, spoke_len: usize, have_doppler: bool) -> Self {
        Arpa {
            setup: TargetSetup::new(radar_id, spokes, spoke_len, have_doppler),
            history: HistorySpokes::new(spokes, spoke_len),
            targets: Vec::new(),
            next_target_id: 0,
            doppler_scan_time: vec![0; spokes],
            own_position: None,
            doppler_acquisition: false,
        }
    }

    /// Rotation period of the sensor in milliseconds.
    pub fn set_rotation_period(&mut self, ms: u64) {
        self.setup.rotation_period_ms = ms;
    }

    /// Own-ship fix from the navigation feed.
    pub fn set_position(&mut self, pos: GeoPosition) {
        if pos.is_valid() {
            self.own_position = Some(pos);
        } else {
            log::warn!("invalid own position {} ignored", pos);
        }
    }

    /// Enable auto-acquisition of targets flagged by the sensor's Doppler
    /// processing.
    pub fn set_doppler_acquisition(&mut self, enable: bool) -> Result<(), TrackError> {
        if enable && !self.setup.have_doppler {
            return Err(TrackError::DopplerNotSupported);
        }
        self.doppler_acquisition = enable;
        Ok(())
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Ingest one spoke into the history image. Cells whose previous sweep
    /// was on a traced boundary are painted back into `spoke.data` so the
    /// display shows the contour.
    pub fn process_spoke(&mut self, spoke: &mut Spoke, legend: &Legend) {
        if spoke.range == 0 || spoke.data.is_empty() {
            return;
        }
        let Some(pos) = spoke.pos else {
            log::trace!("spoke without a fix, no target processing possible");
            return;
        };
        if !pos.is_valid() {
            log::warn!("spoke carries invalid fix {}, dropped", pos);
            return;
        }

        let pixels_per_meter = spoke.data.len() as f64 / spoke.range as f64;
        if self.setup.pixels_per_meter != pixels_per_meter {
            log::debug!(
                "spoke range change from {} to {} pixels/m, {} meters",
                self.setup.pixels_per_meter,
                pixels_per_meter,
                spoke.range
            );
            self.setup.pixels_per_meter = pixels_per_meter;
            self.history =
                HistorySpokes::new(self.setup.spokes as usize, self.setup.spoke_len as usize);
            for target in self.targets.iter_mut() {
                target.clear_contour();
            }
        }

        let angle = self
            .history
            .mod_spokes(spoke.bearing.unwrap_or(spoke.angle) as i32);
        let history_spoke = &mut self.history.spokes[angle];
        history_spoke.time = spoke.time;
        history_spoke.pos = pos;

        for radius in 0..history_spoke.sweep.len() {
            let had_contour = history_spoke.sweep[radius].contains(HistoryPixel::CONTOUR);
            let mut pixel = HistoryPixel::empty();
            if let Some(byte) = spoke.data.get(radius).copied() {
                if byte >= legend.strong_return {
                    pixel = HistoryPixel::INITIAL;
                }
                if byte == legend.doppler_approaching {
                    pixel.insert(HistoryPixel::APPROACHING);
                }
                if byte == legend.doppler_receding {
                    pixel.insert(HistoryPixel::RECEDING);
                }
            }
            history_spoke.sweep[radius] = pixel;
            if had_contour {
                if let Some(out) = spoke.data.get_mut(radius) {
                    *out = legend.border;
                }
            }
        }
    }

    /// The per-rotation sweep: drop lost targets, then give every target up
    /// to three chances to be re-located, strongest tracks first so they
    /// claim and clear their pixels before weaker ones compete for the same
    /// blob. Returns the reports for the outbound encoder.
    pub fn refresh_all(&mut self) -> Vec<TargetReport> {
        if self.setup.pixels_per_meter == 0. {
            return Vec::new();
        }
        let Some(own_pos) = self.own_position else {
            log::trace!("no own position, sweep skipped");
            return Vec::new();
        };

        self.cleanup_lost_targets();
        self.targets
            .sort_by(|a, b| b.status.rank().cmp(&a.status.rank()));

        let speed = MAX_DETECTION_SPEED_KN * KN_TO_MS; // m/sec
        let search_radius = (speed * self.setup.rotation_period() as f64
            * self.setup.pixels_per_meter
            / 1000.) as i32;
        log::debug!(
            "sweep start targets={} search_radius={} pix/m={}",
            self.targets.len(),
            search_radius,
            self.setup.pixels_per_meter
        );

        let radar_id = self.setup.radar_id as u32;
        for pass in Pass::iter() {
            let radius = match pass {
                Pass::First => search_radius / 4,
                Pass::Second => search_radius / 3,
                Pass::Third => search_radius,
            };
            for target in self.targets.iter_mut() {
                if pass == Pass::First
                    && !(target.position.speed_kn >= 2.5
                        && target.status.at_least(STATUS_TO_OUTPUT))
                {
                    // the first pass only covers fast, well-established
                    // targets
                    continue;
                }
                match target.refresh(&self.setup, &mut self.history, &own_pos, radius, pass) {
                    Ok(()) => {
                        if target.id == 0 {
                            // first stable fix: assign an id
                            self.next_target_id += 1;
                            if self.next_target_id >= MAX_TARGET_ID {
                                self.next_target_id = 1;
                            }
                            target.id = self.next_target_id + MAX_TARGET_ID * radar_id;
                        }
                    }
                    Err(TrackError::AlreadyRefreshed) | Err(TrackError::WaitForRefresh) => {}
                    Err(e) => {
                        log::debug!("target {} refresh: {}", target.id, e);
                    }
                }
            }
        }

        let own_ext = ExtendedPosition::new(own_pos, 0., 0., 0, 0., 0.);
        let mut reports = Vec::new();
        for target in &self.targets {
            if target.refreshed == RefreshState::Found
                && target.status.at_least(STATUS_TO_OUTPUT)
                && target.serving_radar == self.setup.radar_id
            {
                let pol = self.setup.pos2polar(&target.position, &own_ext);
                reports.push(TargetReport {
                    id: target.id,
                    range_m: pol.r as f64 / self.setup.pixels_per_meter,
                    bearing_deg: pol.angle as f64 * 360. / self.setup.spokes_f64,
                    speed_kn: target.position.speed_kn,
                    course_deg: target.course,
                    doppler: target.doppler,
                    automatic: target.automatic,
                });
            }
        }
        log::debug!(
            "sweep end targets={} reports={}",
            self.targets.len(),
            reports.len()
        );
        reports
    }

    /// Walk the raw image for approaching/receding echoes that no tracked
    /// target has claimed and spawn a new target for each. Bearings are
    /// stepped two at a time since a target must be wider than two cells,
    /// and a bearing is only rescanned once the beam has passed it again.
    pub fn search_doppler_targets(&mut self) {
        if !self.doppler_acquisition || !self.setup.have_doppler {
            return;
        }
        let Some(own_pos) = self.own_position else {
            return;
        };
        if self.setup.pixels_per_meter == 0. {
            return;
        }

        let range_start = 20;
        let range_end = (self.setup.spoke_len as f64 * 0.93) as i32;
        let scan_margin = self.setup.scan_margin();

        let mut angle = 0;
        while angle < self.setup.spokes {
            let angle_time = self.history.spoke_time(angle);
            // the beam must have passed the bearing plus a margin, so the
            // refresh sweep has had its chance to claim these pixels first
            let ahead_time = self.history.spoke_time(angle + 3 * scan_margin);
            if angle_time > self.doppler_scan_time[angle as usize] + DOPPLER_RESCAN_MS
                && ahead_time >= angle_time
            {
                self.doppler_scan_time[angle as usize] = angle_time;
                for r in range_start..range_end {
                    if self.history.scan_pix(&Doppler::AnyDoppler, angle, r) {
                        // an echo that does not belong to any tracked target
                        let time = self.history.spoke_time(angle);
                        let own = ExtendedPosition::new(
                            self.history.spoke_pos(angle),
                            0.,
                            0.,
                            time,
                            0.,
                            0.,
                        );
                        let pol = Polar::new(angle, r, time);
                        let mut position = self.setup.polar2pos(&pol, &own);
                        position.time = time;
                        log::debug!("auto-acquired Doppler target at {}", position.pos);
                        let mut target = ArpaTarget::new(
                            position,
                            self.setup.spokes as usize,
                            Doppler::AnyDoppler,
                            true,
                            self.setup.have_doppler,
                        );
                        // refresh right away; this claims and clears the blob
                        // so the rest of this echo is not acquired again
                        if let Err(e) = target.refresh(
                            &self.setup,
                            &mut self.history,
                            &own_pos,
                            ACQUIRE_SEARCH_RADIUS,
                            Pass::Second,
                        ) {
                            log::debug!("auto-acquired target not confirmed: {}", e);
                        }
                        self.targets.push(target);
                    }
                }
            }
            angle += 2;
        }
    }

    /// Operator acquisition at a designated geographic position.
    pub fn acquire_at(&mut self, pos: GeoPosition) {
        if !pos.is_valid() {
            log::warn!("acquisition at invalid position {} ignored", pos);
            return;
        }
        log::debug!("operator acquisition at {}", pos);
        let position = ExtendedPosition::new(pos, 0., 0., 0, 0., 0.);
        self.targets.push(ArpaTarget::new(
            position,
            self.setup.spokes as usize,
            Doppler::Any,
            false,
            self.setup.have_doppler,
        ));
    }

    /// Delete the non-lost target closest to the position. Returns false if
    /// no target lies within the cutoff distance.
    pub fn delete_nearest(&mut self, pos: &GeoPosition) -> bool {
        let mut best: Option<(usize, f64)> = None;
        for (i, target) in self.targets.iter().enumerate() {
            if target.status == TargetStatus::Lost {
                continue;
            }
            let dif_lat = (pos.lat - target.position.pos.lat) * METERS_PER_DEGREE_LATITUDE;
            let dif_lon =
                (pos.lon - target.position.pos.lon) * meters_per_degree_longitude(&pos.lat);
            let dist2 = dif_lat * dif_lat + dif_lon * dif_lon;
            if best.map_or(true, |(_, d)| dist2 < d) {
                best = Some((i, dist2));
            }
        }
        match best {
            Some((i, dist2)) if dist2 <= MAX_DELETE_DISTANCE_M * MAX_DELETE_DISTANCE_M => {
                log::debug!("deleting target {} near {}", self.targets[i].id, pos);
                self.targets.remove(i);
                true
            }
            _ => {
                log::debug!(
                    "no target to delete within {} m of {}",
                    MAX_DELETE_DISTANCE_M,
                    pos
                );
                false
            }
        }
    }

    pub fn clear_all(&mut self) {
        self.targets.clear();
    }

    /// The traced boundaries of all live targets, for the display overlay.
    pub fn contours(&self) -> Vec<TargetContour> {
        self.targets
            .iter()
            .filter(|t| t.status != TargetStatus::Lost && !t.contour.points.is_empty())
            .map(|t| TargetContour {
                id: t.id,
                points: t.contour.points.clone(),
                radar_fix: t.radar_pos,
            })
            .collect()
    }

    fn cleanup_lost_targets(&mut self) {
        self.targets.retain(|t| t.status != TargetStatus::Lost);
        for target in self.targets.iter_mut() {
            target.refreshed = RefreshState::NotFound;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPOKES: usize = 256;
    const SPOKE_LEN: usize = 256;
    const RANGE_M: u32 = 512; // 0.5 pixels per meter
    const ROTATION_MS: u64 = 2500;

    fn own() -> GeoPosition {
        GeoPosition::new(53., 5.)
    }

    fn legend() -> Legend {
        Legend {
            strong_return: 128,
            doppler_approaching: 255,
            doppler_receding: 254,
            border: 200,
        }
    }

    fn arpa(have_doppler: bool) -> Arpa {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut arpa = Arpa::new(1, SPOKES, SPOKE_LEN, have_doppler);
        arpa.set_rotation_period(ROTATION_MS);
        arpa.set_position(own());
        arpa
    }

    /// Paint one full rotation, optionally with a rectangular blob.
    fn paint_rotation(arpa: &mut Arpa, time: u64, blob: Option<(i32, i32, i32, i32)>, value: u8) {
        for angle in 0..SPOKES as u32 {
            let mut data = vec![0u8; SPOKE_LEN];
            if let Some((a0, a1, r0, r1)) = blob {
                if (a0..=a1).contains(&(angle as i32)) {
                    for r in r0..=r1 {
                        data[r as usize] = value;
                    }
                }
            }
            let mut spoke = Spoke {
                angle,
                bearing: None,
                range: RANGE_M,
                time,
                pos: Some(own()),
                data,
            };
            arpa.process_spoke(&mut spoke, &legend());
        }
    }

    fn geo_of(arpa: &Arpa, angle: i32, r: i32) -> GeoPosition {
        let own_ext = ExtendedPosition::new(own(), 0., 0., 0, 0., 0.);
        arpa.setup.polar2pos(&Polar::new(angle, r, 0), &own_ext).pos
    }

    #[test]
    fn stationary_target_reaches_output_status() {
        let mut arpa = arpa(false);

        // blob centered on (63, 95)
        let blob = Some((60, 66, 90, 100));
        paint_rotation(&mut arpa, ROTATION_MS, blob, 200);
        arpa.acquire_at(geo_of(&arpa, 63, 95));
        assert_eq!(arpa.target_count(), 1);

        for rotation in 1..=6u64 {
            if rotation > 1 {
                paint_rotation(&mut arpa, rotation * ROTATION_MS, blob, 200);
            }
            let reports = arpa.refresh_all();
            let target = &arpa.targets[0];
            assert_eq!(target.status, TargetStatus::Tracked(rotation as u32));
            assert!(
                target.position.speed_kn < 1.,
                "rotation {}: speed {}",
                rotation,
                target.position.speed_kn
            );
            if rotation >= STATUS_TO_OUTPUT as u64 {
                assert_eq!(reports.len(), 1);
                let report = &reports[0];
                assert_ne!(report.id, 0);
                assert!(!report.automatic);
                assert!((report.range_m - 190.).abs() < 15., "range {}", report.range_m);
                assert!(
                    (report.bearing_deg - 88.6).abs() < 4.,
                    "bearing {}",
                    report.bearing_deg
                );
                assert!(report.speed_kn < 1.);
            } else {
                assert!(reports.is_empty());
            }
        }

        // the traced boundary is exposed for rendering
        let contours = arpa.contours();
        assert_eq!(contours.len(), 1);
        assert!(!contours[0].points.is_empty());
        assert_eq!(contours[0].radar_fix, own());
    }

    #[test]
    fn second_refresh_within_rotation_is_a_no_op() {
        let mut arpa = arpa(false);
        let blob = Some((60, 66, 90, 100));
        paint_rotation(&mut arpa, ROTATION_MS, blob, 200);
        arpa.acquire_at(geo_of(&arpa, 63, 95));
        arpa.refresh_all();

        let status = arpa.targets[0].status;
        let pos = arpa.targets[0].position.pos;
        // same rotation, no new image: nothing may change
        let reports = arpa.refresh_all();
        assert!(reports.is_empty());
        assert_eq!(arpa.targets[0].status, status);
        assert_eq!(arpa.targets[0].position.pos, pos);
    }

    #[test]
    fn unacquired_position_is_dropped_immediately() {
        let mut arpa = arpa(false);
        paint_rotation(&mut arpa, ROTATION_MS, None, 0);
        arpa.acquire_at(geo_of(&arpa, 63, 95));
        arpa.refresh_all();
        // nothing at the designated position: the Acquire0 target is lost
        // and removed on the next cleanup
        assert_eq!(arpa.targets[0].status, TargetStatus::Lost);
        paint_rotation(&mut arpa, 2 * ROTATION_MS, None, 0);
        arpa.refresh_all();
        assert_eq!(arpa.target_count(), 0);
    }

    #[test]
    fn established_target_survives_misses_until_retry_budget() {
        let mut arpa = arpa(false);
        let blob = Some((60, 66, 90, 100));
        let mut rotation = 0u64;

        paint_rotation(&mut arpa, ROTATION_MS, blob, 200);
        arpa.acquire_at(geo_of(&arpa, 63, 95));
        for _ in 0..5 {
            rotation += 1;
            if rotation > 1 {
                paint_rotation(&mut arpa, rotation * ROTATION_MS, blob, 200);
            }
            arpa.refresh_all();
        }
        assert!(arpa.targets[0].status.at_least(5));

        // the echo disappears; the target survives a retry budget of missed
        // rotations before it is dropped
        let mut alive_rotations = 0;
        for _ in 0..16 {
            rotation += 1;
            paint_rotation(&mut arpa, rotation * ROTATION_MS, None, 0);
            arpa.refresh_all();
            if arpa.target_count() == 0 {
                break;
            }
            alive_rotations += 1;
        }
        assert_eq!(arpa.target_count(), 0);
        assert!(
            alive_rotations > 10,
            "target dropped after only {} missed rotations",
            alive_rotations
        );
    }

    #[test]
    fn delete_nearest_removes_only_the_closer_target() {
        let mut arpa = arpa(false);
        paint_rotation(&mut arpa, ROTATION_MS, None, 0);

        let near = GeoPosition::new(53.0018, 5.); // ~200 m north
        let far = GeoPosition::new(53.0054, 5.); // ~600 m north
        arpa.acquire_at(near);
        arpa.acquire_at(far);
        assert_eq!(arpa.target_count(), 2);

        // beyond the cutoff: nothing happens
        assert!(!arpa.delete_nearest(&GeoPosition::new(53.09, 5.)));
        assert_eq!(arpa.target_count(), 2);

        assert!(arpa.delete_nearest(&GeoPosition::new(53.0016, 5.)));
        assert_eq!(arpa.target_count(), 1);
        assert!((arpa.targets[0].position.pos.lat - far.lat).abs() < 1e-9);

        arpa.clear_all();
        assert_eq!(arpa.target_count(), 0);
    }

    #[test]
    fn doppler_scan_acquires_and_classifies() {
        let mut arpa = arpa(true);
        assert!(arpa.set_doppler_acquisition(true).is_ok());

        // an approaching echo nobody asked for
        let blob = Some((100, 106, 50, 60));
        paint_rotation(&mut arpa, ROTATION_MS, blob, 255);
        arpa.refresh_all();
        arpa.search_doppler_targets();
        // the first hit claims the whole echo, so one blob spawns one target
        assert_eq!(arpa.target_count(), 1);
        assert!(arpa.targets[0].automatic);
        assert_eq!(arpa.targets[0].status, TargetStatus::Tracked(1));

        for rotation in 2..=4u64 {
            paint_rotation(&mut arpa, rotation * ROTATION_MS, blob, 255);
            arpa.refresh_all();
            arpa.search_doppler_targets();
        }
        assert_eq!(arpa.target_count(), 1);
        let survivor = &arpa.targets[0];
        assert!(survivor.status.at_least(2));
        assert_eq!(survivor.doppler, Doppler::Approaching);
        assert!(survivor.automatic);
    }

    #[test]
    fn doppler_acquisition_needs_capable_sensor() {
        let mut arpa = arpa(false);
        assert_eq!(
            arpa.set_doppler_acquisition(true).unwrap_err(),
            TrackError::DopplerNotSupported
        );
    }

    #[test]
    fn small_fast_target_latches_and_dies_on_a_wide_miss() {
        let mut arpa = arpa(false);

        // a small blob jumping 12 bearings per rotation
        paint_rotation(&mut arpa, ROTATION_MS, Some((60, 64, 90, 96)), 200);
        arpa.acquire_at(geo_of(&arpa, 62, 93));
        arpa.refresh_all();
        assert_eq!(arpa.targets[0].status, TargetStatus::Tracked(1));

        paint_rotation(&mut arpa, 2 * ROTATION_MS, Some((72, 76, 90, 96)), 200);
        arpa.refresh_all();
        let target = &arpa.targets[0];
        assert_eq!(target.status, TargetStatus::Tracked(2));
        assert!(target.small_fast);
        assert!(
            target.position.speed_kn > 20.,
            "speed {}",
            target.position.speed_kn
        );

        // a small fast target that cannot be reacquired close by is presumed
        // gone
        paint_rotation(&mut arpa, 3 * ROTATION_MS, None, 0);
        arpa.refresh_all();
        assert_eq!(arpa.targets[0].status, TargetStatus::Lost);
    }

    #[test]
    fn range_change_resets_the_image() {
        let mut arpa = arpa(false);
        let blob = Some((60, 66, 90, 100));
        paint_rotation(&mut arpa, ROTATION_MS, blob, 200);
        assert!((arpa.setup.pixels_per_meter - 0.5).abs() < 1e-12);

        // the same data now covers twice the range
        let mut spoke = Spoke {
            angle: 0,
            bearing: None,
            range: RANGE_M * 2,
            time: 2 * ROTATION_MS,
            pos: Some(own()),
            data: vec![0u8; SPOKE_LEN],
        };
        arpa.process_spoke(&mut spoke, &legend());
        assert!((arpa.setup.pixels_per_meter - 0.25).abs() < 1e-12);
        // the old image is gone
        assert!(!arpa.history.pix(&Doppler::Any, 63, 95));
    }

    #[test]
    fn contour_is_painted_into_the_next_sweep() {
        let mut arpa = arpa(false);
        let blob = Some((60, 66, 90, 100));
        paint_rotation(&mut arpa, ROTATION_MS, blob, 200);
        arpa.acquire_at(geo_of(&arpa, 63, 95));
        arpa.refresh_all();

        // next rotation: the spoke that crosses the traced boundary comes
        // back with border values painted in
        let mut data = vec![0u8; SPOKE_LEN];
        for r in 90..=100 {
            data[r as usize] = 180;
        }
        let mut spoke = Spoke {
            angle: 63,
            bearing: None,
            range: RANGE_M,
            time: 2 * ROTATION_MS,
            pos: Some(own()),
            data,
        };
        arpa.process_spoke(&mut spoke, &legend());
        assert!(spoke.data.iter().any(|&b| b == legend().border));
    }

    #[test]
    fn report_serializes_for_the_encoder() {
        let report = TargetReport {
            id: 100042,
            range_m: 1852.,
            bearing_deg: 45.,
            speed_kn: 12.3,
            course_deg: 270.,
            doppler: Doppler::Approaching,
            automatic: true,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["id"], 100042);
        assert_eq!(json["doppler"], "approaching");
        assert_eq!(json["automatic"], true);
    }
}
