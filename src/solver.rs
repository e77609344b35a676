use colored::Colorize;
use hifitime::Epoch;
use nalgebra::{DMatrix, DVector};

use crate::constants::{
    EARTH_MU_GPS, EARTH_ROTATION_RATE, KEPLER_MAX_ITER, KEPLER_TOLERANCE, SOLVER_CONVERGENCE_EPS,
    SOLVER_MAX_ITER, SPEED_OF_LIGHT, WGS84_A, WGS84_F,
};
use crate::ephemeris::Ephemeris;
use crate::error::ReceiverError;
use crate::registry::PseudorangeMeasurement;

/// Newton-iterates Kepler's equation `E - e*sin(E) = M` to the tolerance in
/// §4.5, with a generous safety backstop well above the documented 10
/// target iterations.
fn get_eccentric_anomaly(eph: &Ephemeris, t_k: f64) -> f64 {
    let n0 = (EARTH_MU_GPS / eph.a.powi(3)).sqrt();
    let n = n0 + eph.deln;
    let mk = eph.m0 + n * t_k;

    let mut e = mk;
    for _ in 0..(KEPLER_MAX_ITER * 3) {
        let e_next = e + (mk - e + eph.ecc * e.sin()) / (1.0 - eph.ecc * e.cos());
        if (e_next - e).abs() <= KEPLER_TOLERANCE {
            return e_next;
        }
        e = e_next;
    }
    e
}

/// Computes a satellite's ECEF position at transmit time `t`, per §4.5.
pub fn compute_sv_position_ecef(eph: &Ephemeris, t: Epoch) -> [f64; 3] {
    let mut time_from_eph_t = (t - eph.toe_gpst).to_seconds();

    if time_from_eph_t > 302400.0 {
        time_from_eph_t -= 604800.0;
    }
    if time_from_eph_t < -302400.0 {
        time_from_eph_t += 604800.0;
    }

    let ecc_anomaly = get_eccentric_anomaly(eph, time_from_eph_t);

    let v_k =
        ((1.0 - (eph.ecc * eph.ecc)).sqrt() * ecc_anomaly.sin()).atan2(ecc_anomaly.cos() - eph.ecc);

    let phi_k = v_k + eph.omg;
    let duk = eph.cus * (2.0 * phi_k).sin() + eph.cuc * (2.0 * phi_k).cos();
    let drk = eph.crs * (2.0 * phi_k).sin() + eph.crc * (2.0 * phi_k).cos();
    let dik = eph.cis * (2.0 * phi_k).sin() + eph.cic * (2.0 * phi_k).cos();

    let uk = phi_k + duk;
    let rk = eph.a * (1.0 - eph.ecc * ecc_anomaly.cos()) + drk;
    let ik = eph.i0 + eph.i_dot * time_from_eph_t + dik;

    let orb_plane_x = rk * uk.cos();
    let orb_plane_y = rk * uk.sin();

    let omega = eph.omg0 + (eph.omg_dot - EARTH_ROTATION_RATE) * time_from_eph_t
        - EARTH_ROTATION_RATE * eph.toe as f64;

    let ecef_x = orb_plane_x * omega.cos() - orb_plane_y * ik.cos() * omega.sin();
    let ecef_y = orb_plane_x * omega.sin() + orb_plane_y * ik.cos() * omega.cos();
    let ecef_z = orb_plane_y * ik.sin();

    [ecef_x, ecef_y, ecef_z]
}

/// One navigation fix: ECEF position, clock bias, and its geodetic form.
#[derive(Debug, Clone, Copy)]
pub struct Solution {
    pub clock_bias_s: f64,
    pub position_ecef: (f64, f64, f64),
    pub position_geodetic: (f64, f64, f64), // (lat_deg, lon_deg, height_m)
}

/// Bowring's iterative geodetic conversion on the WGS-84 ellipsoid.
fn ecef_to_geodetic(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let a = WGS84_A;
    let f = WGS84_F;
    let e2 = f * (2.0 - f);
    let p = (x * x + y * y).sqrt();
    let lon = y.atan2(x);

    let mut lat = (z / (p * (1.0 - e2))).atan();
    let mut n = a;
    for _ in 0..10 {
        let sin_lat = lat.sin();
        n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        lat = (z + e2 * n * sin_lat).atan2(p);
    }
    let height = p / lat.cos() - n;

    (lat.to_degrees(), lon.to_degrees(), height)
}

/// Gauss-Newton least-squares solve for ECEF position + clock bias from
/// pseudorange measurements, per §4.6.
pub fn solve(measurements: &[PseudorangeMeasurement]) -> Result<Solution, ReceiverError> {
    if measurements.len() < 4 {
        return Err(ReceiverError::SolverDivergence { iterations: 0 });
    }

    let n = measurements.len();
    let mut beta = DVector::<f64>::zeros(4);

    for iterations in 1..=SOLVER_MAX_ITER {
        let mut jacobian = DMatrix::<f64>::zeros(n, 4);
        let mut residual = DVector::<f64>::zeros(n);

        for (i, m) in measurements.iter().enumerate() {
            let dx = beta[0] - m.sv_position_ecef[0];
            let dy = beta[1] - m.sv_position_ecef[1];
            let dz = beta[2] - m.sv_position_ecef[2];
            let range = (dx * dx + dy * dy + dz * dz).sqrt();
            let b = beta[3];

            residual[i] = range - SPEED_OF_LIGHT * (m.t_received_gps + b - m.t_transmitted_sv);
            jacobian[(i, 0)] = dx / range;
            jacobian[(i, 1)] = dy / range;
            jacobian[(i, 2)] = dz / range;
            jacobian[(i, 3)] = -SPEED_OF_LIGHT;
        }

        let jt = jacobian.transpose();
        let jtj = &jt * &jacobian;
        let jtr = &jt * &residual;

        let jtj_inv = match jtj.try_inverse() {
            Some(inv) => inv,
            None => return Err(ReceiverError::SolverDivergence { iterations }),
        };

        let delta = jtj_inv * jtr;
        beta -= &delta;

        if delta.norm() < SOLVER_CONVERGENCE_EPS {
            let (lat, lon, h) = ecef_to_geodetic(beta[0], beta[1], beta[2]);
            log::warn!(
                "{}: lat={lat:.6} lon={lon:.6} h={h:.1} bias={:+.3e} after {iterations} iters",
                "fix".green(),
                beta[3],
            );
            return Ok(Solution {
                clock_bias_s: beta[3],
                position_ecef: (beta[0], beta[1], beta[2]),
                position_geodetic: (lat, lon, h),
            });
        }
    }

    Err(ReceiverError::SolverDivergence {
        iterations: SOLVER_MAX_ITER,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn synthetic_measurement(sv_pos: [f64; 3], rx_pos: [f64; 3], t_received: f64, bias: f64) -> PseudorangeMeasurement {
        let dx = sv_pos[0] - rx_pos[0];
        let dy = sv_pos[1] - rx_pos[1];
        let dz = sv_pos[2] - rx_pos[2];
        let range = (dx * dx + dy * dy + dz * dz).sqrt();
        let t_transmitted = t_received + bias - range / SPEED_OF_LIGHT;
        PseudorangeMeasurement {
            t_received_gps: t_received,
            t_transmitted_sv: t_transmitted,
            sv_position_ecef: sv_pos,
        }
    }

    #[test]
    fn solver_recovers_known_position_with_zero_bias() {
        let rx_pos = [4_200_000.0, 170_000.0, 4_780_000.0];
        let sv_positions = [
            [20_000_000.0, 10_000_000.0, 5_000_000.0],
            [5_000_000.0, 25_000_000.0, 4_000_000.0],
            [-10_000_000.0, 15_000_000.0, 20_000_000.0],
            [12_000_000.0, -18_000_000.0, 15_000_000.0],
        ];
        let measurements: Vec<_> = sv_positions
            .iter()
            .map(|&p| synthetic_measurement(p, rx_pos, 100.0, 0.0))
            .collect();

        let sol = solve(&measurements).expect("solver should converge");
        assert_relative_eq!(sol.position_ecef.0, rx_pos[0], epsilon = 1.0);
        assert_relative_eq!(sol.position_ecef.1, rx_pos[1], epsilon = 1.0);
        assert_relative_eq!(sol.position_ecef.2, rx_pos[2], epsilon = 1.0);
        assert_relative_eq!(sol.clock_bias_s, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn constant_transmit_time_shift_reappears_as_clock_bias() {
        let rx_pos = [4_200_000.0, 170_000.0, 4_780_000.0];
        let sv_positions = [
            [20_000_000.0, 10_000_000.0, 5_000_000.0],
            [5_000_000.0, 25_000_000.0, 4_000_000.0],
            [-10_000_000.0, 15_000_000.0, 20_000_000.0],
            [12_000_000.0, -18_000_000.0, 15_000_000.0],
        ];
        let delta_b = 1e-3;
        let measurements: Vec<_> = sv_positions
            .iter()
            .map(|&p| synthetic_measurement(p, rx_pos, 100.0, delta_b))
            .collect();

        let sol = solve(&measurements).expect("solver should converge");
        assert_relative_eq!(sol.position_ecef.0, rx_pos[0], epsilon = 1.0);
        assert_relative_eq!(sol.clock_bias_s, delta_b, epsilon = 1e-6);
    }

    #[test]
    fn coplanar_geometry_diverges() {
        let sv_positions = [
            [20_000_000.0, 0.0, 0.0],
            [21_000_000.0, 1_000_000.0, 0.0],
            [19_000_000.0, -1_000_000.0, 0.0],
            [20_500_000.0, 500_000.0, 0.0],
        ];
        let rx_pos = [4_200_000.0, 170_000.0, 4_780_000.0];
        let measurements: Vec<_> = sv_positions
            .iter()
            .map(|&p| synthetic_measurement(p, rx_pos, 100.0, 0.0))
            .collect();

        assert!(solve(&measurements).is_err());
    }
}
