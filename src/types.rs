use rustfft::num_complex::Complex64;

/// One (I,Q) baseband sample.
pub type Sample = Complex64;

/// Outcome of one acquisition attempt for a single PRN.
#[derive(Default, Clone, Copy, Debug)]
pub struct GnssCorrelationParam {
    pub doppler_hz: f64,
    pub code_phase_samples: usize,
    pub peak_to_side_ratio: f64,
}

/// A single (early, prompt, late) correlator triple for one millisecond.
#[derive(Default, Clone, Copy, Debug)]
pub struct CorrelationTriple {
    pub early: Complex64,
    pub prompt: Complex64,
    pub late: Complex64,
}
