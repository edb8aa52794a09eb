use nalgebra::{SMatrix, SVector};
use std::f64::consts::PI;

use crate::polar::Polar;

const NOISE: f64 = 1.0;
// original value 0.015, larger values make target better follow change of
// target heading. But too large a value makes the target adapt to any change
// of heading immediately, causing instability. 2.0 seems to follow a fast
// (20+ knts) pilot boat close in-shore. Allowed covariance of target speed
// in lat and lon, critical for the performance of target tracking:
// lower value makes the target go straight,
// higher values allow the target to make curves.

type Matrix2x2 = SMatrix<f64, 2, 2>;
type Matrix4x4 = SMatrix<f64, 4, 4>;
type Matrix4x2 = SMatrix<f64, 4, 2>;
type Matrix2x4 = SMatrix<f64, 2, 4>;

/// Target state in a local tangent plane centered on the own-ship fix:
/// meters north and east of the reference, and velocity in meters/second.
#[derive(Debug, Clone, Copy)]
pub struct LocalPosition {
    pub lat: f64,          // meters north of the reference fix
    pub lon: f64,          // meters east of the reference fix
    pub dlat_dt: f64,      // m/s
    pub dlon_dt: f64,      // m/s
    pub sd_speed_m_s: f64, // standard deviation of the speed, m/s
}

impl LocalPosition {
    pub fn new(lat: f64, lon: f64, dlat_dt: f64, dlon_dt: f64) -> Self {
        Self {
            lat,
            lon,
            dlat_dt,
            dlon_dt,
            sd_speed_m_s: 0.,
        }
    }
}

// As the measurement to state transformation is non-linear, the extended
// Kalman filter is used. As the state transformation is linear, the state
// transformation matrix F is equal to the jacobian A.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    a: Matrix4x4,
    at: Matrix4x4,
    w: Matrix4x2,
    wt: Matrix2x4,
    h: Matrix2x4,
    ht: Matrix4x2,
    p: Matrix4x4,
    q: Matrix2x2,
    r: Matrix2x2,
    k: Matrix4x2,
    i: Matrix4x4,
    spokes: f64,
}

impl KalmanFilter {
    pub fn new(spokes: usize) -> Self {
        let mut f = KalmanFilter {
            a: Matrix4x4::identity(),
            at: Matrix4x4::identity(),
            w: Matrix4x2::zeros(),
            wt: Matrix2x4::zeros(),
            h: Matrix2x4::zeros(),
            ht: Matrix4x2::zeros(),
            p: Matrix4x4::zeros(),
            q: Matrix2x2::zeros(),
            r: Matrix2x2::zeros(),
            k: Matrix4x2::zeros(),
            i: Matrix4x4::identity(),
            spokes: spokes as f64,
        };
        f.reset_filter();
        f
    }

    /// Reset the filter so it can be used for a new target.
    pub fn reset_filter(&mut self) {
        self.a = Matrix4x4::identity();
        self.at = Matrix4x4::identity();

        // Jacobian matrix of partial derivatives dfi / dwj
        self.w = Matrix4x2::zeros();
        self.w[(2, 0)] = 1.;
        self.w[(3, 1)] = 1.;
        self.wt = self.w.transpose();

        // Observation matrix, jacobian of the observation function h:
        // angle = atan2(lon, lat) * spokes / (2 * pi) + v1
        // r = sqrt(lat * lat + lon * lon) + v2
        // v is measurement noise. Filled in by set_measurement, as it depends
        // on the expected position.
        self.h = Matrix2x4::zeros();
        self.ht = Matrix4x2::zeros();

        // P estimate error covariance, initial values
        self.p = Matrix4x4::zeros();
        self.p[(0, 0)] = 20.;
        self.p[(1, 1)] = 20.;
        self.p[(2, 2)] = 4.;
        self.p[(3, 3)] = 4.;

        // Q process noise covariance. The speed variances control the rate
        // of turn of targets and how fast targets pick up speed.
        self.q[(0, 0)] = NOISE;
        self.q[(1, 1)] = NOISE;

        // R measurement noise covariance
        self.r[(0, 0)] = 100.0; // variance in the angle
        self.r[(1, 1)] = 25.; // variance in radius

        self.k = Matrix4x2::zeros();
    }

    /// Advance the state under the constant-velocity model. `delta_time` is
    /// in seconds; covariance inflation is done separately by [`update_p`]
    /// so that repeated predictions within one rotation do not inflate twice.
    ///
    /// [`update_p`]: KalmanFilter::update_p
    pub fn predict(&mut self, xx: &mut LocalPosition, delta_time: f64) {
        let mut x = SVector::<f64, 4>::new(xx.lat, xx.lon, xx.dlat_dt, xx.dlon_dt);
        self.a[(0, 2)] = delta_time;
        self.a[(1, 3)] = delta_time;

        self.at[(2, 0)] = delta_time;
        self.at[(3, 1)] = delta_time;

        x = self.a * x;
        xx.lat = x[(0, 0)];
        xx.lon = x[(1, 0)];
        xx.dlat_dt = x[(2, 0)];
        xx.dlon_dt = x[(3, 0)];
        xx.sd_speed_m_s = ((self.p[(2, 2)] + self.p[(3, 3)]) / 2.).sqrt();
        // rough approximation of the standard deviation of the speed
    }

    /// Calculate the apriori P. Separated from [`predict`] so it runs
    /// exactly once per fused measurement, whatever pass found the target.
    ///
    /// [`predict`]: KalmanFilter::predict
    pub fn update_p(&mut self) {
        self.p = self.a * self.p * self.at + self.w * self.q * self.wt;
    }

    /// Fuse a polar measurement. `pol` is the measured position, `expected`
    /// the predicted position in the same polar frame, `local_position` the
    /// predicted state that is corrected in place. `scale` is pixels per
    /// meter.
    pub fn set_measurement(
        &mut self,
        pol: &Polar,
        local_position: &mut LocalPosition,
        expected: &Polar,
        scale: f64,
    ) {
        let q_sum: f64 =
            local_position.lon * local_position.lon + local_position.lat * local_position.lat;
        if q_sum == 0. {
            log::trace!("measurement at the sensor origin ignored");
            return;
        }

        let c: f64 = self.spokes / (2. * PI);
        self.h[(0, 0)] = -c * local_position.lon / q_sum;
        self.h[(0, 1)] = c * local_position.lat / q_sum;

        let q_sum = q_sum.sqrt();
        self.h[(1, 0)] = local_position.lat / q_sum * scale;
        self.h[(1, 1)] = local_position.lon / q_sum * scale;

        self.ht = self.h.transpose();

        // Z is the difference between the measured and the expected position,
        // with the angle difference taken the short way around
        let mut a = (pol.angle - expected.angle) as f64;
        if a > self.spokes / 2. {
            a -= self.spokes;
        }
        if a < -self.spokes / 2. {
            a += self.spokes;
        }
        let b = (pol.r - expected.r) as f64;
        let z = SMatrix::<f64, 2, 1>::new(a, b);

        let mut x = SVector::<f64, 4>::new(
            local_position.lat,
            local_position.lon,
            local_position.dlat_dt,
            local_position.dlon_dt,
        );

        // calculate the Kalman gain
        let innovation = self.h * self.p * self.ht + self.r;
        let Some(inverse) = innovation.try_inverse() else {
            log::warn!("singular innovation covariance, measurement skipped");
            return;
        };
        self.k = self.p * self.ht * inverse;

        // calculate the aposteriori expected position
        x += self.k * z;
        local_position.lat = x[(0, 0)];
        local_position.lon = x[(1, 0)];
        local_position.dlat_dt = x[(2, 0)];
        local_position.dlon_dt = x[(3, 0)];

        // update covariance P
        self.p = (self.i - self.k * self.h) * self.p;
        local_position.sd_speed_m_s = ((self.p[(2, 2)] + self.p[(3, 3)]) / 2.).sqrt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPOKES: f64 = 2048.;
    const SCALE: f64 = 1.0; // pixels per meter

    fn to_polar(lat: f64, lon: f64) -> Polar {
        let mut angle = (f64::atan2(lon, lat) * SPOKES / (2. * PI)) as i32;
        if angle < 0 {
            angle += SPOKES as i32;
        }
        let r = ((lat * lat + lon * lon).sqrt() * SCALE) as i32;
        Polar::new(angle, r, 0)
    }

    #[test]
    fn predict_moves_the_state() {
        let mut filter = KalmanFilter::new(SPOKES as usize);
        let mut x = LocalPosition::new(1000., 500., 2., -1.);
        filter.predict(&mut x, 2.5);
        assert!((x.lat - 1005.).abs() < 1e-9);
        assert!((x.lon - 497.5).abs() < 1e-9);
        assert!((x.dlat_dt - 2.).abs() < 1e-9);
    }

    #[test]
    fn converges_on_constant_velocity() {
        let dt = 2.5;
        let (vn, ve) = (3.0, -2.0);
        let mut true_lat = 1400.;
        let mut true_lon = 1400.;

        let mut filter = KalmanFilter::new(SPOKES as usize);
        // bootstrap at the first measured position with zero velocity
        let mut x = LocalPosition::new(true_lat, true_lon, 0., 0.);

        for _ in 0..50 {
            true_lat += vn * dt;
            true_lon += ve * dt;

            filter.predict(&mut x, dt);
            let expected = to_polar(x.lat, x.lon);
            let measured = to_polar(true_lat, true_lon);
            filter.update_p();
            filter.set_measurement(&measured, &mut x, &expected, SCALE);
        }

        assert!(
            (x.dlat_dt - vn).abs() < 0.8,
            "north velocity {} not near {}",
            x.dlat_dt,
            vn
        );
        assert!(
            (x.dlon_dt - ve).abs() < 0.8,
            "east velocity {} not near {}",
            x.dlon_dt,
            ve
        );
        assert!((x.lat - true_lat).abs() < 25.);
        assert!((x.lon - true_lon).abs() < 25.);
        assert!(x.sd_speed_m_s < 2.);
    }

    #[test]
    fn reset_restores_initial_covariance() {
        let mut filter = KalmanFilter::new(SPOKES as usize);
        let mut x = LocalPosition::new(1000., 1000., 0., 0.);
        filter.predict(&mut x, 2.5);
        filter.update_p();
        filter.reset_filter();
        let mut y = LocalPosition::new(1000., 1000., 0., 0.);
        filter.predict(&mut y, 0.);
        assert!((y.sd_speed_m_s - 2.).abs() < 1e-9); // sqrt((4 + 4) / 2)
    }
}
