//! Types and traits for recording training metrics.
//!
//! A [`Record`] is a set of key-value pairs produced during learning or
//! evaluation, e.g. the mean episode reward or an evaluation histogram
//! snapshot. A [`Recorder`] writes records to some output destination;
//! [`NullRecorder`] discards them.
mod base;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
