//! JSONL decision log.
//!
//! Each line is one serialized [`DecisionRecord`]:
//! ```json
//! {"episode":0,"turn":1,"before":{...},"action":{...},"reward":-12.0,"after":{...}}
//! ```

use super::{DecisionRecord, SinkError, TrainingSink};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

pub struct JsonlSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonlSink {
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Append to `path`, creating it if needed. Earlier runs are kept.
    pub fn file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl TrainingSink for JsonlSink {
    fn record(&self, record: &DecisionRecord) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().map_err(|_| SinkError::Poisoned)?;
        serde_json::to_writer(&mut *writer, record)?;
        writeln!(&mut *writer)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "JsonlSink"
    }

    fn on_shutdown(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
