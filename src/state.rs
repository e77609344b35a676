use serde::Serialize;

use crate::registry::SatelliteStatus;
use crate::solver::Solution;

/// Geodetic position nested under a [`SolutionView`], per §6.
#[derive(Serialize, Clone, Copy, Debug)]
pub struct PositionView {
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
}

/// One computed navigation fix, as rendered in the status JSON's
/// `solutions[]` array.
#[derive(Serialize, Clone, Copy, Debug)]
pub struct SolutionView {
    pub clock_bias: f64,
    pub position: PositionView,
}

impl SolutionView {
    pub fn new(sol: &Solution) -> Self {
        Self {
            clock_bias: sol.clock_bias_s,
            position: PositionView {
                latitude: sol.position_geodetic.0,
                longitude: sol.position_geodetic.1,
                height: sol.position_geodetic.2,
            },
        }
    }
}

/// One tracked (or further along) satellite's status snapshot, per §6.
#[derive(Serialize, Clone, Debug)]
pub struct TrackedSatelliteView {
    pub satellite_id: u8,
    pub acquired_at: Option<f64>,
    pub bit_boundary_found: bool,
    pub bit_phase: Option<i8>,
    pub required_subframes_received: usize,
    pub subframe_count: usize,
    pub carrier_frequency_shifts: Vec<f64>,
    pub prn_code_phase_shifts: Vec<f64>,
    pub correlations: Vec<[f64; 3]>,
}

/// An untracked satellite's status snapshot, per §6.
#[derive(Serialize, Clone, Copy, Debug)]
pub struct UntrackedSatelliteView {
    pub satellite_id: u8,
    pub next_acquisition_at: f64,
}

/// The full payload served by `GET /` on the status HTTP server.
#[derive(Serialize, Clone, Debug, Default)]
pub struct GnssState {
    pub solutions: Vec<SolutionView>,
    pub tracked_satellites: Vec<TrackedSatelliteView>,
    pub untracked_satellites: Vec<UntrackedSatelliteView>,
}

impl GnssState {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn required_subframes_received(subframes: &std::collections::VecDeque<crate::registry::SubframeRecord>) -> usize {
    let mut ids = std::collections::HashSet::new();
    for sf in subframes {
        if sf.subframe_id <= 3 {
            ids.insert(sf.subframe_id);
        }
    }
    ids.len()
}

pub fn is_untracked(status: SatelliteStatus) -> bool {
    matches!(status, SatelliteStatus::Untracked | SatelliteStatus::Lost)
}
