use thiserror::Error;

/// The full error taxonomy of the receiver core.
///
/// Variants split into two camps: [`ReceiverError::is_fatal`] tells the
/// driver whether to unwind `run_loop` with a non-zero exit, or whether the
/// error is scoped to a single satellite/epoch and should be logged and
/// folded back into that satellite's state machine instead.
#[derive(Error, Debug)]
pub enum ReceiverError {
    #[error("sample source error: {0}")]
    SampleSource(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("sat {prn}: acquisition failed, psr={psr:.2} below threshold")]
    AcquisitionFailure { prn: u8, psr: f64 },

    #[error("sat {prn}: loss of lock")]
    LossOfLock { prn: u8 },

    #[error("sat {prn}: parity failure in subframe")]
    ParityFailure { prn: u8 },

    #[error("sat {prn}: ephemeris incomplete")]
    EphemerisIncomplete { prn: u8 },

    #[error("solver did not converge after {iterations} iterations")]
    SolverDivergence { iterations: usize },
}

impl ReceiverError {
    /// Fatal errors stop the receiver; everything else is retried locally.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReceiverError::SampleSource(_) | ReceiverError::InvariantViolation(_)
        )
    }

    /// Process exit code this error should produce if it escapes `main`.
    pub fn exit_code(&self) -> i32 {
        match self {
            ReceiverError::SampleSource(_) | ReceiverError::InvariantViolation(_) => 2,
            _ => 1,
        }
    }
}
