use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use colored::Colorize;
use gnss_rs::constellation::Constellation;
use gnss_rs::sv::SV;
use rayon::prelude::*;
use rustfft::num_complex::Complex64;

use crate::channel::Channel;
use crate::constants::{ACQUISITION_WINDOW_MSEC, NUM_GPS_SATS, SAMPLES_PER_MS};
use crate::device::RtlSdrDevice;
use crate::error::ReceiverError;
use crate::gold_code::build_code_table;
use crate::recording::{IQFileType, IQRecording};
use crate::registry::PseudorangeMeasurement;
use crate::solver;
use crate::state::{
    is_untracked, required_subframes_received, GnssState, SolutionView, TrackedSatelliteView,
    UntrackedSatelliteView,
};

const PERIOD_RCV: f64 = 0.001;
const MIN_SATS_FOR_FIX: usize = 4;

/// Runtime knobs threaded down from the CLI, rather than read through
/// globals, per the ambient-stack decisions.
pub struct ReceiverConfig {
    pub fs: f64,
    pub fi: f64,
    pub sats: Vec<SV>,
    pub start_unix_sec: f64,
}

pub type ReadIQFn = dyn FnMut(usize, usize) -> Result<Vec<Complex64>, ReceiverError> + Send;

pub fn parse_sat_list(sats: &str) -> Vec<SV> {
    if sats.is_empty() {
        return (1..=NUM_GPS_SATS as u8).map(|prn| SV::new(Constellation::GPS, prn)).collect();
    }
    sats.split(',')
        .filter_map(|s| s.trim().parse::<u8>().ok())
        .map(|prn| SV::new(Constellation::GPS, prn))
        .collect()
}

/// Owns the Satellite Registry (one [`Channel`] per candidate PRN), the
/// sliding sample window, the solver, and the published status snapshot.
/// Drives the 1ms cooperative tick loop described in §5.
pub struct Receiver {
    read_iq_fn: Box<ReadIQFn>,
    period_sp: usize,
    off_samples: usize,
    sample_window: Vec<Complex64>,
    ts_sec: f64,

    sat_order: Vec<SV>,
    channels: HashMap<SV, Channel>,
    acquisition_cursor: usize,

    exit_req: Arc<AtomicBool>,
    pub_state: Arc<Mutex<GnssState>>,
}

impl Receiver {
    pub fn new_from_file(
        config: &ReceiverConfig,
        file: PathBuf,
        iq_file_type: IQFileType,
        off_msec: usize,
        exit_req: Arc<AtomicBool>,
        pub_state: Arc<Mutex<GnssState>>,
    ) -> Result<Self, ReceiverError> {
        let mut recording = IQRecording::new(file, config.fs, iq_file_type)?;
        let read_iq_fn: Box<ReadIQFn> =
            Box::new(move |off, n| recording.read_iq_file(off, n));
        Self::new(config, read_iq_fn, off_msec, exit_req, pub_state)
    }

    pub fn new_from_rtl_sdr(
        config: &ReceiverConfig,
        exit_req: Arc<AtomicBool>,
        pub_state: Arc<Mutex<GnssState>>,
    ) -> Result<Self, ReceiverError> {
        let mut dev = RtlSdrDevice::new(config.fs)?;
        let read_iq_fn: Box<ReadIQFn> = Box::new(move |_off, n| dev.read_iq_data(n));
        Self::new(config, read_iq_fn, 0, exit_req, pub_state)
    }

    fn new(
        config: &ReceiverConfig,
        read_iq_fn: Box<ReadIQFn>,
        off_msec: usize,
        exit_req: Arc<AtomicBool>,
        pub_state: Arc<Mutex<GnssState>>,
    ) -> Result<Self, ReceiverError> {
        let period_sp = (PERIOD_RCV * config.fs) as usize;
        let code_table = build_code_table();

        let mut channels = HashMap::new();
        for sv in &config.sats {
            let code = code_table
                .iter()
                .find(|c| c.prn == sv.prn)
                .unwrap_or_else(|| panic!("no PRN code generated for PRN {}", sv.prn));
            channels.insert(*sv, Channel::new(*sv, Arc::new(code.clone()), config.fs, config.fi));
        }

        Ok(Self {
            read_iq_fn,
            period_sp,
            off_samples: off_msec * period_sp,
            sample_window: Vec::new(),
            ts_sec: config.start_unix_sec,
            sat_order: config.sats.clone(),
            channels,
            acquisition_cursor: 0,
            exit_req,
            pub_state,
        })
    }

    /// Pulls the next millisecond of samples and maintains the trailing
    /// `ACQUISITION_WINDOW_MSEC` window acquisition needs.
    fn fetch_samples_msec(&mut self) -> Result<(), ReceiverError> {
        let window_len = ACQUISITION_WINDOW_MSEC * SAMPLES_PER_MS;
        let want = if self.sample_window.is_empty() {
            window_len
        } else {
            self.period_sp
        };

        let mut fresh = (self.read_iq_fn)(self.off_samples, want)?;
        self.off_samples += want;
        self.sample_window.append(&mut fresh);
        self.ts_sec += want as f64 / (1000.0 * self.period_sp as f64);

        if self.sample_window.len() > window_len {
            let drop = self.sample_window.len() - window_len;
            self.sample_window.drain(0..drop);
        }
        Ok(())
    }

    /// True if some channel's decoded almanac describes `prn` as unhealthy.
    /// Almanac pages describe satellites other than the transmitting PRN, so
    /// this has to scan every channel's collected entries rather than just
    /// the target PRN's own channel.
    fn is_prn_almanac_unhealthy(&self, prn: u8) -> bool {
        self.channels
            .values()
            .filter_map(|ch| ch.almanac_entries.get(&prn))
            .any(|a| !a.is_healthy())
    }

    /// Picks at most one Untracked/Lost PRN to attempt acquisition this
    /// tick, round-robin over `sat_order` (§5). Almanac-unhealthy PRNs are
    /// still attempted, but only after a pass over healthy-or-unknown PRNs
    /// turns up nothing due (§10, Almanac deprioritization).
    fn pick_acquisition_candidate(&mut self) -> Option<SV> {
        let n = self.sat_order.len();
        for pass in 0..2 {
            for i in 0..n {
                let idx = (self.acquisition_cursor + i) % n;
                let sv = self.sat_order[idx];
                if pass == 0 && self.is_prn_almanac_unhealthy(sv.prn) {
                    continue;
                }
                if self.channels[&sv].is_due_for_acquisition(self.ts_sec) {
                    self.acquisition_cursor = (idx + 1) % n;
                    return Some(sv);
                }
            }
        }
        None
    }

    fn process_step(&mut self) -> Result<(), ReceiverError> {
        self.fetch_samples_msec()?;
        let ts_sec = self.ts_sec;
        let window = &self.sample_window;
        let acquiring_sv = self.pick_acquisition_candidate();

        self.channels.par_iter_mut().try_for_each(|(&sv, channel)| {
            channel.process_samples(window, ts_sec, Some(sv) == acquiring_sv)
        })?;

        self.collect_measurements(ts_sec);
        self.compute_fix(ts_sec);
        self.publish_status();

        Ok(())
    }

    /// Stamps a fresh pseudorange measurement for any satellite that just
    /// completed a subframe and has a usable ephemeris (§4.5/§5 step (d)).
    fn collect_measurements(&mut self, ts_sec: f64) {
        for channel in self.channels.values_mut() {
            if !channel.is_ephemeris_complete() {
                continue;
            }
            let Some(eph) = channel.state.ephemeris else { continue };
            let Some(cc) = channel.state.clock_correction else { continue };

            let t_received = ts_sec;
            let dt_sv = cc.a_f0 + cc.a_f1 * (t_received - cc.t_oc as f64)
                + cc.a_f2 * (t_received - cc.t_oc as f64).powi(2)
                - cc.t_gd;
            let t_transmitted = t_received - dt_sv;

            let epoch = hifitime::Epoch::from_gpst_seconds(t_transmitted);
            let sv_position_ecef = solver::compute_sv_position_ecef(&eph, epoch);

            channel.state.last_pseudorange_measurement = Some(PseudorangeMeasurement {
                t_received_gps: t_received,
                t_transmitted_sv: t_transmitted,
                sv_position_ecef,
            });
        }
    }

    /// Invokes the Solver at most once per tick, whenever at least
    /// `MIN_SATS_FOR_FIX` PRNs have a fresh measurement in the same sample
    /// epoch (§2, §5 step (d)); never wall-clock throttled.
    fn compute_fix(&mut self, ts_sec: f64) {
        let measurements: Vec<PseudorangeMeasurement> = self
            .channels
            .values()
            .filter_map(|c| c.state.last_pseudorange_measurement)
            .collect();

        if measurements.len() < MIN_SATS_FOR_FIX {
            return;
        }

        match solver::solve(&measurements) {
            Ok(solution) => {
                log::warn!(
                    "{}: t={ts_sec:.3} lat={:.6} lon={:.6} h={:.1}",
                    "FIX".green(),
                    solution.position_geodetic.0,
                    solution.position_geodetic.1,
                    solution.position_geodetic.2,
                );
                let mut state = self.pub_state.lock().unwrap();
                state.solutions.push(SolutionView::new(&solution));
            }
            Err(e) => log::warn!("solver: {e}"),
        }
    }

    fn publish_status(&self) {
        let mut tracked = Vec::new();
        let mut untracked = Vec::new();

        for sv in &self.sat_order {
            let ch = &self.channels[sv];
            if is_untracked(ch.state.status) {
                untracked.push(UntrackedSatelliteView {
                    satellite_id: sv.prn,
                    next_acquisition_at: ch.state.next_acquisition_at,
                });
            } else {
                let correlations = ch
                    .state
                    .last_correlations
                    .iter()
                    .rev()
                    .take(20)
                    .map(|c| [c.early.norm(), c.prompt.norm(), c.late.norm()])
                    .collect();
                tracked.push(TrackedSatelliteView {
                    satellite_id: sv.prn,
                    acquired_at: ch.state.acquired_at,
                    bit_boundary_found: ch.state.bit_boundary_offset.is_some(),
                    bit_phase: ch.state.bit_phase,
                    required_subframes_received: required_subframes_received(&ch.state.subframes),
                    subframe_count: ch.state.subframes.len(),
                    carrier_frequency_shifts: vec![ch.state.carrier_doppler_hz],
                    prn_code_phase_shifts: vec![ch.state.code_phase_samples],
                    correlations,
                });
            }
        }

        let mut state = self.pub_state.lock().unwrap();
        state.tracked_satellites = tracked;
        state.untracked_satellites = untracked;
    }

    /// Runs until `num_msec` ticks have elapsed (0 = unbounded) or the exit
    /// flag is set; checked exactly once per tick, never mid-tick (§5).
    pub fn run_loop(&mut self, num_msec: usize) -> Result<(), ReceiverError> {
        let mut n = 0usize;
        loop {
            self.process_step()?;

            if self.exit_req.load(Ordering::SeqCst) {
                log::info!("exit requested");
                break;
            }
            n += 1;
            if num_msec != 0 && n >= num_msec {
                break;
            }
        }
        Ok(())
    }
}
