/*! Persisted run artifacts.

Each experiment run produces one [`RunRecord`]: its stimulus, the
device's response, and (where applicable) the software reference it was
compared against. [`ResultSink`] is the external collaborator that
decides what, if anything, happens to that record; [`NullResultSink`] is
the default and [`JsonFileResultSink`] (feature `persist-results`) is
the bundled reference that writes one timestamped file per run.
*/
use serde::{Deserialize, Serialize};

/// One experiment run's inputs, outputs, and reference comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub experiment: String,
    pub dut_id: u8,
    pub inputs: Vec<f64>,
    pub outputs: Vec<f64>,
    pub reference: Option<Vec<f64>>,
    pub passed: bool,
}

/// Where a finished [`RunRecord`] goes.
pub trait ResultSink {
    fn save(&self, experiment: &str, record: &RunRecord) -> std::io::Result<()>;
}

/// Discards every record. The default when no persistence is wanted.
pub struct NullResultSink;

impl ResultSink for NullResultSink {
    fn save(&self, _experiment: &str, _record: &RunRecord) -> std::io::Result<()> {
        Ok(())
    }
}

/// Writes one JSON file per run under `base_dir/<timestamp>_<experiment>/record.json`.
#[cfg(feature = "persist-results")]
pub struct JsonFileResultSink {
    base_dir: std::path::PathBuf,
}

#[cfg(feature = "persist-results")]
impl JsonFileResultSink {
    pub fn new(base_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[cfg(feature = "persist-results")]
impl ResultSink for JsonFileResultSink {
    fn save(&self, experiment: &str, record: &RunRecord) -> std::io::Result<()> {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f");
        let dir = self.base_dir.join(format!("{stamp}_{experiment}"));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("record.json");
        let text = serde_json::to_string_pretty(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, text)
    }
}
