//! Errors in the harness.
use thiserror::Error;

/// Errors in the harness.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Learning was stopped by a cancellation signal.
    ///
    /// [`Trainer::train`](crate::Trainer::train) catches this variant exactly
    /// once and falls through to the final save, so an interrupted run never
    /// loses its partial progress.
    #[error("training interrupted")]
    Interrupted,

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}
