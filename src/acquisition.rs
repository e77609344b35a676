use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

use crate::constants::{
    ACQUISITION_COHERENT_MS, ACQUISITION_INCOHERENT_MS, ACQUISITION_PSR_THRESHOLD,
    ACQUISITION_SIDE_LOBE_GUARD_SAMPLES, ACQUISITION_WINDOW_MSEC, DOPPLER_SEARCH_HZ,
    DOPPLER_STEP_HZ, SAMPLES_PER_MS,
};
use crate::error::ReceiverError;
use crate::gold_code::PrnCode;
use crate::util::{calc_correlation, doppler_shift, get_max_with_idx};

/// Outcome of one acquisition attempt (§4.1).
#[derive(Debug, Clone, Copy)]
pub enum AcquisitionResult {
    NotVisible { best_psr: f64 },
    Visible {
        doppler_hz: f64,
        code_phase_samples: usize,
        peak_to_side_ratio: f64,
    },
}

/// Searches `window` (exactly `ACQUISITION_WINDOW_MSEC` ms of samples)
/// across the Doppler search range for a PRN, integrating coherently over
/// `ACQUISITION_COHERENT_MS` ms blocks and incoherently across the window.
/// An FFT-length mismatch between `window` and the planned block size is a
/// fatal driver-level invariant violation (§4.1), not a per-PRN failure.
pub fn try_acquire(
    planner: &mut FftPlanner<f64>,
    code: &PrnCode,
    window: &[Complex64],
    fs: f64,
    fi: f64,
) -> Result<AcquisitionResult, ReceiverError> {
    if window.len() != ACQUISITION_WINDOW_MSEC * SAMPLES_PER_MS {
        return Err(ReceiverError::InvariantViolation(format!(
            "acquisition window length {} != expected {}",
            window.len(),
            ACQUISITION_WINDOW_MSEC * SAMPLES_PER_MS
        )));
    }

    let n_bins = (2.0 * DOPPLER_SEARCH_HZ / DOPPLER_STEP_HZ) as usize + 1;
    let num_blocks = ACQUISITION_WINDOW_MSEC / ACQUISITION_COHERENT_MS;

    let mut best = AcquisitionResult::NotVisible { best_psr: 0.0 };
    let mut best_psr = 0.0;
    let mut best_doppler_abs = f64::MAX;

    for bin in 0..n_bins {
        let doppler_hz = -DOPPLER_SEARCH_HZ + bin as f64 * DOPPLER_STEP_HZ;
        let mut incoherent_sum = vec![0.0f64; SAMPLES_PER_MS];

        for block in 0..num_blocks.min(ACQUISITION_INCOHERENT_MS) {
            let lo = block * SAMPLES_PER_MS;
            let hi = lo + SAMPLES_PER_MS;
            let mut seg = window[lo..hi].to_vec();
            doppler_shift(&mut seg, fi + doppler_hz, 0.0, fs);
            let corr = calc_correlation(planner, &seg, &code.fft);
            for (acc, c) in incoherent_sum.iter_mut().zip(corr.iter()) {
                *acc += c.norm();
            }
        }

        let (peak_idx, peak_val) = get_max_with_idx(&incoherent_sum);
        let floor = side_lobe_mean(&incoherent_sum, peak_idx);
        let psr = if floor > 0.0 { peak_val / floor } else { 0.0 };
        let doppler_abs = doppler_hz.abs();

        if psr > best_psr || (psr == best_psr && doppler_abs < best_doppler_abs) {
            best_psr = psr;
            best_doppler_abs = doppler_abs;
            best = AcquisitionResult::Visible {
                doppler_hz,
                code_phase_samples: peak_idx,
                peak_to_side_ratio: psr,
            };
        }
    }

    Ok(match best {
        AcquisitionResult::Visible {
            peak_to_side_ratio, ..
        } if peak_to_side_ratio >= ACQUISITION_PSR_THRESHOLD => best,
        _ => AcquisitionResult::NotVisible { best_psr },
    })
}

/// Mean of correlation magnitude cells more than
/// `ACQUISITION_SIDE_LOBE_GUARD_SAMPLES` samples from the peak, cyclically.
fn side_lobe_mean(corr: &[f64], peak_idx: usize) -> f64 {
    let n = corr.len();
    let mut sum = 0.0;
    let mut count = 0usize;
    for (i, &v) in corr.iter().enumerate() {
        let raw_dist = if i > peak_idx {
            i - peak_idx
        } else {
            peak_idx - i
        };
        let dist = raw_dist.min(n - raw_dist);
        if dist > ACQUISITION_SIDE_LOBE_GUARD_SAMPLES {
            sum += v;
            count += 1;
        }
    }
    if count > 0 {
        sum / count as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_FS_HZ;
    use crate::gold_code::PrnCode;

    #[test]
    fn acquires_injected_signal_within_tolerance() {
        let mut planner = FftPlanner::new();
        let code = PrnCode::new(5, &mut planner);
        let true_doppler = 1500.0;
        let true_phase = 300usize;

        let mut window = Vec::with_capacity(ACQUISITION_WINDOW_MSEC * SAMPLES_PER_MS);
        for _ in 0..ACQUISITION_WINDOW_MSEC {
            let mut ms: Vec<Complex64> = code.baseband.clone();
            ms.rotate_right(true_phase);
            doppler_shift(&mut ms, -true_doppler, 0.0, DEFAULT_FS_HZ);
            window.extend(ms);
        }

        match try_acquire(&mut planner, &code, &window, DEFAULT_FS_HZ, 0.0).unwrap() {
            AcquisitionResult::Visible {
                doppler_hz,
                code_phase_samples,
                peak_to_side_ratio,
            } => {
                assert!((doppler_hz - true_doppler).abs() <= 250.0);
                let phase_err = (code_phase_samples as i64 - true_phase as i64).unsigned_abs();
                assert!(phase_err <= 1 || (SAMPLES_PER_MS as u64 - phase_err) <= 1);
                assert!(peak_to_side_ratio >= ACQUISITION_PSR_THRESHOLD);
            }
            AcquisitionResult::NotVisible { .. } => panic!("expected injected signal to be acquired"),
        }
    }

    #[test]
    fn pure_noise_is_not_visible() {
        let mut planner = FftPlanner::new();
        let code = PrnCode::new(7, &mut planner);
        let mut window = Vec::with_capacity(ACQUISITION_WINDOW_MSEC * SAMPLES_PER_MS);
        let mut lcg: u64 = 0x2545F4914F6CDD1D;
        for _ in 0..(ACQUISITION_WINDOW_MSEC * SAMPLES_PER_MS) {
            lcg = lcg.wrapping_mul(6364136223846793005).wrapping_add(1);
            let noise = ((lcg >> 33) as f64 / u32::MAX as f64) - 0.5;
            window.push(Complex64::new(noise, 0.0));
        }
        match try_acquire(&mut planner, &code, &window, DEFAULT_FS_HZ, 0.0).unwrap() {
            AcquisitionResult::NotVisible { .. } => {}
            AcquisitionResult::Visible { peak_to_side_ratio, .. } => {
                assert!(peak_to_side_ratio < ACQUISITION_PSR_THRESHOLD)
            }
        }
    }

    #[test]
    fn window_length_mismatch_is_invariant_violation() {
        let mut planner = FftPlanner::new();
        let code = PrnCode::new(9, &mut planner);
        let short_window = vec![Complex64::new(0.0, 0.0); SAMPLES_PER_MS];
        match try_acquire(&mut planner, &code, &short_window, DEFAULT_FS_HZ, 0.0) {
            Err(crate::error::ReceiverError::InvariantViolation(_)) => {}
            other => panic!("expected an invariant violation, got {other:?}"),
        }
    }
}
