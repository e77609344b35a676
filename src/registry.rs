use std::collections::VecDeque;

use crate::constants::SAMPLES_PER_MS;
use crate::ephemeris::Ephemeris;
use crate::types::CorrelationTriple;

pub const LAST_CORRELATIONS_LEN: usize = 1000;
pub const PROMPT_CHIP_STREAM_LEN: usize = 20 * 100;
pub const BIT_STREAM_LEN: usize = 1500;
pub const MAX_SUBFRAMES: usize = 5;

/// Lifecycle status of one satellite's tracking state. Monotone non-decreasing
/// except for explicit demotion back to `Untracked` on loss of lock.
#[derive(Clone, Copy, PartialEq, Eq, Debug, PartialOrd, Ord)]
pub enum SatelliteStatus {
    Untracked,
    Acquired,
    Tracking,
    BitSynced,
    FrameSynced,
    EphemerisReady,
    Lost,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ClockCorrection {
    pub a_f0: f64,
    pub a_f1: f64,
    pub a_f2: f64,
    pub t_gd: f64,
    pub t_oc: u32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PseudorangeMeasurement {
    pub t_received_gps: f64,
    pub t_transmitted_sv: f64,
    pub sv_position_ecef: [f64; 3],
}

#[derive(Clone, Debug)]
pub struct SubframeRecord {
    pub subframe_id: u8,
    pub tow: u32,
    pub bits: Vec<u8>,
}

/// Per-PRN tracking state, per the data model: one of these lives for every
/// candidate satellite, owned exclusively by the Satellite Registry (the
/// `HashMap<SV, Channel>` in [`crate::receiver::Receiver`], each entry
/// embedding one of these).
pub struct SatelliteState {
    pub prn_id: u8,
    pub status: SatelliteStatus,
    pub acquired_at: Option<f64>,
    pub next_acquisition_at: f64,

    pub carrier_doppler_hz: f64,
    pub carrier_phase_rad: f64,
    pub code_phase_samples: f64,
    pub code_phase_rate_samples_per_ms: f64,

    pub last_correlations: VecDeque<CorrelationTriple>,
    pub prompt_chip_stream: VecDeque<i8>,
    pub bit_boundary_offset: Option<usize>,
    pub bit_phase: Option<i8>,
    pub bit_stream: VecDeque<i8>,
    pub subframes: VecDeque<SubframeRecord>,

    pub ephemeris: Option<Ephemeris>,
    pub clock_correction: Option<ClockCorrection>,
    pub last_pseudorange_measurement: Option<PseudorangeMeasurement>,
}

impl SatelliteState {
    pub fn new(prn_id: u8) -> Self {
        Self {
            prn_id,
            status: SatelliteStatus::Untracked,
            acquired_at: None,
            next_acquisition_at: 0.0,
            carrier_doppler_hz: 0.0,
            carrier_phase_rad: 0.0,
            code_phase_samples: 0.0,
            code_phase_rate_samples_per_ms: SAMPLES_PER_MS as f64,
            last_correlations: VecDeque::with_capacity(LAST_CORRELATIONS_LEN),
            prompt_chip_stream: VecDeque::with_capacity(PROMPT_CHIP_STREAM_LEN),
            bit_boundary_offset: None,
            bit_phase: None,
            bit_stream: VecDeque::with_capacity(BIT_STREAM_LEN),
            subframes: VecDeque::with_capacity(MAX_SUBFRAMES),
            ephemeris: None,
            clock_correction: None,
            last_pseudorange_measurement: None,
        }
    }

    pub fn is_ephemeris_complete(&self) -> bool {
        self.status == SatelliteStatus::EphemerisReady && self.ephemeris.is_some()
    }

    /// Resets every field at or below `Tracking`, per the demotion invariant.
    pub fn demote_to_untracked(&mut self, ts_sec: f64, retry_interval_sec: f64) {
        self.status = SatelliteStatus::Untracked;
        self.acquired_at = None;
        self.next_acquisition_at = ts_sec + retry_interval_sec;
        self.carrier_doppler_hz = 0.0;
        self.carrier_phase_rad = 0.0;
        self.code_phase_samples = 0.0;
        self.code_phase_rate_samples_per_ms = SAMPLES_PER_MS as f64;
        self.last_correlations.clear();
        self.prompt_chip_stream.clear();
        self.bit_boundary_offset = None;
        self.bit_phase = None;
        self.bit_stream.clear();
        self.subframes.clear();
        self.ephemeris = None;
        self.clock_correction = None;
        self.last_pseudorange_measurement = None;
    }

    pub fn push_correlation(&mut self, triple: CorrelationTriple) {
        if self.last_correlations.len() >= LAST_CORRELATIONS_LEN {
            self.last_correlations.pop_front();
        }
        self.last_correlations.push_back(triple);
    }

    pub fn push_chip(&mut self, chip: i8) {
        if self.prompt_chip_stream.len() >= PROMPT_CHIP_STREAM_LEN {
            self.prompt_chip_stream.pop_front();
        }
        self.prompt_chip_stream.push_back(chip);
    }

    pub fn push_bit(&mut self, bit: i8) {
        if self.bit_stream.len() >= BIT_STREAM_LEN {
            self.bit_stream.pop_front();
        }
        self.bit_stream.push_back(bit);
    }

    pub fn push_subframe(&mut self, sf: SubframeRecord) {
        if self.subframes.len() >= MAX_SUBFRAMES {
            self.subframes.pop_front();
        }
        self.subframes.push_back(sf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demotion_resets_tracking_fields_but_keeps_prn_id() {
        let mut st = SatelliteState::new(7);
        st.status = SatelliteStatus::EphemerisReady;
        st.push_chip(1);
        st.push_bit(-1);
        st.demote_to_untracked(12.0, 10.0);

        assert_eq!(st.prn_id, 7);
        assert_eq!(st.status, SatelliteStatus::Untracked);
        assert!(st.prompt_chip_stream.is_empty());
        assert!(st.bit_stream.is_empty());
        assert_eq!(st.next_acquisition_at, 22.0);
    }

    #[test]
    fn ring_buffers_stay_bounded() {
        let mut st = SatelliteState::new(1);
        for i in 0..(BIT_STREAM_LEN + 10) {
            st.push_bit(if i % 2 == 0 { 1 } else { -1 });
        }
        assert_eq!(st.bit_stream.len(), BIT_STREAM_LEN);
    }
}
