use log::warn;
use merge2048_core::record::{Record, RecordValue, Recorder};
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "env_steps".to_string(),
        }
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [Record] into a TFRecord.
    ///
    /// The record must carry the step under `env_steps`; records without it
    /// are dropped. [`RecordValue::Scalar`] values become scalar summaries;
    /// [`RecordValue::Array1`] values become one scalar summary per element,
    /// tagged with the element index. Other variants are ignored.
    fn write(&mut self, record: Record) {
        let step = match record.get(&self.step_key) {
            Some(RecordValue::Scalar(v)) => *v as usize,
            _ => {
                warn!("Dropping record without {:?} scalar", self.step_key);
                return;
            }
        };

        for (k, v) in record.iter() {
            if *k != self.step_key {
                match v {
                    RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
                    RecordValue::Array1(data) => {
                        for (i, v) in data.iter().enumerate() {
                            self.writer.add_scalar(&format!("{}/{}", k, i), *v, step);
                        }
                    }
                    RecordValue::DateTime(_) | RecordValue::String(_) => {} // discard value
                };
            }
        }
    }

    fn flush(&mut self) {
        self.writer.flush();
    }
}
