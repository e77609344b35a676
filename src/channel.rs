use std::collections::VecDeque;
use std::sync::Arc;

use colored::Colorize;
use gnss_rs::sv::SV;
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

use crate::acquisition::{self, AcquisitionResult};
use crate::almanac::Almanac;
use crate::constants::{
    ACQUISITION_RETRY_INTERVAL_SEC, B_DLL_HZ, B_FLL_NARROW_HZ, B_FLL_WIDE_HZ, B_PLL_HZ,
    BITS_PER_SYMBOL, BIT_SYNC_MIN_MS, BIT_SYNC_RATIO, CODE_PHASE_JUMP_GUARD_SAMPLES, PI,
    SAMPLES_PER_CHIP, SAMPLES_PER_MS, SP_CORR, T_FLL_PULLIN_SEC,
    LOSS_OF_LOCK_SNR_FACTOR, LOSS_OF_LOCK_WINDOW_MS,
};
use crate::error::ReceiverError;
use crate::gold_code::PrnCode;
use crate::registry::{SatelliteState, SatelliteStatus};
use crate::types::CorrelationTriple;
use crate::util::doppler_shift;

#[derive(Default)]
pub(crate) struct TrackingLoop {
    pub num_tracking_ms: usize,
    pub prev_prompt: Option<Complex64>,
    pub err_phase: f64,
    pub sum_corr_e: f64,
    pub sum_corr_l: f64,
    pub recent_mag_p: VecDeque<f64>,
    pub recent_mag_e: VecDeque<f64>,
    pub recent_mag_l: VecDeque<f64>,
}

#[derive(Default)]
pub(crate) struct BitSync {
    pub hist: [u32; 20],
    pub last_chip: Option<i8>,
    pub num_ms: usize,
    pub ms_in_bit: usize,
    pub bit_accum: f64,
}

/// One satellite's end-to-end processing chain: acquisition, tracking,
/// bit-sync and frame decode, sharing the PRN-specific [`SatelliteState`]
/// that the status server and solver read from.
pub struct Channel {
    pub sv: SV,
    pub(crate) fs: f64,
    pub(crate) fi: f64,
    pub(crate) code: Arc<PrnCode>,
    pub(crate) fft_planner: FftPlanner<f64>,
    pub state: SatelliteState,
    pub ts_sec: f64,
    pub(crate) trk: TrackingLoop,
    pub(crate) bitsync: BitSync,
    pub almanac_entries: std::collections::HashMap<u8, Almanac>,
    last_log_ts: f64,
}

impl Channel {
    pub fn new(sv: SV, code: Arc<PrnCode>, fs: f64, fi: f64) -> Self {
        Self {
            sv,
            fs,
            fi,
            code,
            fft_planner: FftPlanner::new(),
            state: SatelliteState::new(sv.prn),
            ts_sec: 0.0,
            trk: TrackingLoop::default(),
            bitsync: BitSync::default(),
            almanac_entries: std::collections::HashMap::new(),
            last_log_ts: 0.0,
        }
    }

    pub fn is_state_tracking(&self) -> bool {
        matches!(
            self.state.status,
            SatelliteStatus::Tracking
                | SatelliteStatus::BitSynced
                | SatelliteStatus::FrameSynced
                | SatelliteStatus::EphemerisReady
        )
    }

    pub fn is_ephemeris_complete(&self) -> bool {
        self.state.is_ephemeris_complete()
    }

    /// One millisecond tick. `window` holds the trailing acquisition window
    /// of samples (most recent millisecond last). `allow_acquisition` gates
    /// whether this PRN is the one the Acquisition Engine's round-robin
    /// picked for this tick (§5: at most one attempt per tick, system-wide).
    /// Returns `Err` only for a driver-level invariant violation (§4.1),
    /// which is fatal and unwinds the whole run loop.
    pub fn process_samples(
        &mut self,
        window: &[Complex64],
        ts_sec: f64,
        allow_acquisition: bool,
    ) -> Result<(), ReceiverError> {
        self.ts_sec = ts_sec;

        match self.state.status {
            SatelliteStatus::Untracked | SatelliteStatus::Lost => {
                if allow_acquisition && ts_sec >= self.state.next_acquisition_at {
                    self.acquisition_step(window, ts_sec)?;
                }
            }
            _ => {
                let ms = &window[window.len() - SAMPLES_PER_MS..];
                self.tracking_step(ms, ts_sec);
            }
        }
        Ok(())
    }

    pub fn is_due_for_acquisition(&self, ts_sec: f64) -> bool {
        matches!(self.state.status, SatelliteStatus::Untracked | SatelliteStatus::Lost)
            && ts_sec >= self.state.next_acquisition_at
    }

    fn acquisition_step(&mut self, window: &[Complex64], ts_sec: f64) -> Result<(), ReceiverError> {
        match acquisition::try_acquire(&mut self.fft_planner, &self.code, window, self.fs, self.fi)? {
            AcquisitionResult::Visible {
                doppler_hz,
                code_phase_samples,
                peak_to_side_ratio,
            } => {
                log::warn!(
                    "{}: {} doppler={doppler_hz:.0} phase={code_phase_samples} psr={peak_to_side_ratio:.2}",
                    self.sv,
                    "ACQUIRED".green(),
                );
                self.state.status = SatelliteStatus::Acquired;
                self.state.acquired_at = Some(ts_sec);
                self.state.carrier_doppler_hz = doppler_hz;
                self.state.carrier_phase_rad = 0.0;
                self.state.code_phase_samples = code_phase_samples as f64;
                self.state.code_phase_rate_samples_per_ms = SAMPLES_PER_MS as f64;
                self.trk = TrackingLoop::default();
                self.bitsync = BitSync::default();
                self.state.status = SatelliteStatus::Tracking;
            }
            AcquisitionResult::NotVisible { best_psr } => {
                let err = ReceiverError::AcquisitionFailure { prn: self.sv.prn, psr: best_psr };
                log::debug!("{}: {err}", self.sv);
                self.state.next_acquisition_at = ts_sec + ACQUISITION_RETRY_INTERVAL_SEC;
            }
        }
        Ok(())
    }

    /// Early/Prompt/Late correlators at half-chip (`SP_CORR`) spacing
    /// against the current code-phase estimate.
    fn correlate(&self, ms: &[Complex64]) -> CorrelationTriple {
        let mut signal = ms.to_vec();
        doppler_shift(
            &mut signal,
            self.fi + self.state.carrier_doppler_hz,
            self.state.carrier_phase_rad,
            self.fs,
        );

        let n = SAMPLES_PER_MS;
        let spacing = (SP_CORR * SAMPLES_PER_CHIP as f64).round() as usize;
        let code_phase = self.state.code_phase_samples.rem_euclid(n as f64) as usize;

        let mut prompt = Complex64::default();
        let mut early = Complex64::default();
        let mut late = Complex64::default();

        for (j, &s) in signal.iter().enumerate() {
            let p_idx = (j + code_phase) % n;
            prompt += s * self.code.baseband[p_idx];
            early += s * self.code.baseband[(p_idx + n - spacing) % n];
            late += s * self.code.baseband[(p_idx + spacing) % n];
        }

        let scale = 1.0 / n as f64;
        CorrelationTriple {
            early: early * scale,
            prompt: prompt * scale,
            late: late * scale,
        }
    }

    fn tracking_step(&mut self, ms: &[Complex64], ts_sec: f64) {
        let triple = self.correlate(ms);
        self.state.push_correlation(triple);
        self.update_loss_of_lock_window(triple);

        let chip: i8 = if triple.prompt.re >= 0.0 { 1 } else { -1 };
        self.state.push_chip(chip);

        self.run_carrier_loop(triple);

        let code_phase_before = self.state.code_phase_samples;
        self.run_dll(triple);
        let code_jump = (self.state.code_phase_samples - code_phase_before
            - self.state.code_phase_rate_samples_per_ms)
            .abs();

        self.state.code_phase_samples = (self.state.code_phase_samples
            + self.state.code_phase_rate_samples_per_ms)
            .rem_euclid(SAMPLES_PER_MS as f64);

        self.trk.num_tracking_ms += 1;

        if self.check_loss_of_lock() || code_jump > CODE_PHASE_JUMP_GUARD_SAMPLES {
            let err = ReceiverError::LossOfLock { prn: self.sv.prn };
            log::warn!("{}: {} ({err})", self.sv, "LOST".red());
            self.state.demote_to_untracked(ts_sec, ACQUISITION_RETRY_INTERVAL_SEC);
            self.trk = TrackingLoop::default();
            self.bitsync = BitSync::default();
            return;
        }

        if self.state.bit_boundary_offset.is_none() {
            self.bit_sync_step(chip);
        } else {
            self.bit_accumulate_step(chip);
        }

        self.log_periodically();
    }

    fn run_carrier_loop(&mut self, triple: CorrelationTriple) {
        let pull_in = (self.trk.num_tracking_ms as f64) * 1e-3 < T_FLL_PULLIN_SEC;
        let prompt = triple.prompt;

        if let Some(prev) = self.trk.prev_prompt {
            let cross = prompt.re * prev.im - prompt.im * prev.re;
            let dot = prompt.re * prev.re + prompt.im * prev.im;
            if dot != 0.0 || cross != 0.0 {
                let b = if pull_in { B_FLL_WIDE_HZ } else { B_FLL_NARROW_HZ };
                let err_freq_hz = cross.atan2(dot) / (2.0 * PI * 1e-3);
                self.state.carrier_doppler_hz -= 0.25 * b * err_freq_hz * 1e-3;
            }
        }
        self.trk.prev_prompt = Some(prompt);

        if !pull_in && prompt.re != 0.0 {
            let err_phase = (prompt.im / prompt.re).atan() / (2.0 * PI);
            let w = B_PLL_HZ / 0.53;
            self.state.carrier_doppler_hz +=
                1.4 * w * (err_phase - self.trk.err_phase) + w * w * err_phase * 1e-3;
            self.trk.err_phase = err_phase;
        }

        self.state.carrier_phase_rad =
            (self.state.carrier_phase_rad + 2.0 * PI * self.state.carrier_doppler_hz * 1e-3)
                % (2.0 * PI);
    }

    fn run_dll(&mut self, triple: CorrelationTriple) {
        self.trk.sum_corr_e += triple.early.norm();
        self.trk.sum_corr_l += triple.late.norm();

        const N_DLL: usize = 10;
        if self.trk.num_tracking_ms % N_DLL == 0 {
            let e = self.trk.sum_corr_e;
            let l = self.trk.sum_corr_l;
            if e + l > 0.0 {
                let err_code = (e - l) / (e + l);
                self.state.code_phase_samples -=
                    B_DLL_HZ * err_code * SAMPLES_PER_CHIP as f64;
            }
            self.trk.sum_corr_e = 0.0;
            self.trk.sum_corr_l = 0.0;
        }
    }

    fn update_loss_of_lock_window(&mut self, triple: CorrelationTriple) {
        push_bounded(&mut self.trk.recent_mag_p, triple.prompt.norm(), LOSS_OF_LOCK_WINDOW_MS);
        push_bounded(&mut self.trk.recent_mag_e, triple.early.norm(), LOSS_OF_LOCK_WINDOW_MS);
        push_bounded(&mut self.trk.recent_mag_l, triple.late.norm(), LOSS_OF_LOCK_WINDOW_MS);
    }

    fn check_loss_of_lock(&self) -> bool {
        if self.trk.recent_mag_p.len() < LOSS_OF_LOCK_WINDOW_MS {
            return false;
        }
        let mean_p = mean(&self.trk.recent_mag_p);
        let var_e = variance(&self.trk.recent_mag_e);
        let var_l = variance(&self.trk.recent_mag_l);
        mean_p < LOSS_OF_LOCK_SNR_FACTOR * (var_e + var_l).sqrt()
    }

    /// Accumulates sign-transition counts per modulo-20 phase until a
    /// dominant bit boundary emerges (§4.3).
    fn bit_sync_step(&mut self, chip: i8) {
        if let Some(last) = self.bitsync.last_chip {
            if (chip >= 0) != (last >= 0) {
                let phase = self.bitsync.num_ms % BITS_PER_SYMBOL;
                self.bitsync.hist[phase] += 1;
            }
        }
        self.bitsync.last_chip = Some(chip);
        self.bitsync.num_ms += 1;

        if self.bitsync.num_ms < BIT_SYNC_MIN_MS {
            return;
        }

        let (max_idx, &max_val) = self
            .bitsync
            .hist
            .iter()
            .enumerate()
            .max_by_key(|&(_, v)| *v)
            .unwrap();
        let second_max = self
            .bitsync
            .hist
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != max_idx)
            .map(|(_, &v)| v)
            .max()
            .unwrap_or(0);

        if max_val > 0 && (max_val as f64) >= BIT_SYNC_RATIO * (second_max.max(1) as f64) {
            log::warn!("{}: {} boundary={max_idx}", self.sv, "BIT SYNC".green());
            self.state.bit_boundary_offset = Some(max_idx);
            self.state.status = SatelliteStatus::BitSynced;
            self.bitsync.ms_in_bit = 0;
            self.bitsync.bit_accum = 0.0;
        }
    }

    fn bit_accumulate_step(&mut self, chip: i8) {
        self.bitsync.bit_accum += chip as f64;
        self.bitsync.ms_in_bit += 1;

        if self.bitsync.ms_in_bit == BITS_PER_SYMBOL {
            let bit: i8 = if self.bitsync.bit_accum >= 0.0 { 1 } else { -1 };
            self.state.push_bit(bit);
            self.bitsync.bit_accum = 0.0;
            self.bitsync.ms_in_bit = 0;
            self.frame_decode_step();
        }
    }

    fn log_periodically(&mut self) {
        if self.ts_sec - self.last_log_ts > 3.0 {
            log::info!(
                "{}: {} dopp={:5.0} code_phase={:6.1} status={:?} ts={:.3}",
                self.sv,
                "TRCK".blue(),
                self.state.carrier_doppler_hz,
                self.state.code_phase_samples,
                self.state.status,
                self.ts_sec,
            );
            self.last_log_ts = self.ts_sec;
        }
    }
}

fn push_bounded(buf: &mut VecDeque<f64>, v: f64, cap: usize) {
    if buf.len() >= cap {
        buf.pop_front();
    }
    buf.push_back(v);
}

fn mean(v: &VecDeque<f64>) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

fn variance(v: &VecDeque<f64>) -> f64 {
    if v.len() < 2 {
        return 0.0;
    }
    let m = mean(v);
    v.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / v.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnss_rs::constellation::Constellation;

    fn make_channel(prn: u8) -> Channel {
        let mut planner = FftPlanner::new();
        let code = Arc::new(PrnCode::new(prn, &mut planner));
        Channel::new(SV::new(Constellation::GPS, prn), code, crate::constants::DEFAULT_FS_HZ, 0.0)
    }

    #[test]
    fn fresh_channel_starts_untracked() {
        let ch = make_channel(1);
        assert_eq!(ch.state.status, SatelliteStatus::Untracked);
        assert!(!ch.is_state_tracking());
    }

    #[test]
    fn prompt_correlation_peaks_at_correct_code_phase() {
        let mut ch = make_channel(3);
        ch.state.status = SatelliteStatus::Tracking;
        ch.state.code_phase_samples = 0.0;

        let ms = ch.code.baseband.clone();
        let triple = ch.correlate(&ms);
        assert!(triple.prompt.norm() > triple.early.norm() * 0.5);
        assert!(triple.prompt.norm() > 0.5);
    }
}
