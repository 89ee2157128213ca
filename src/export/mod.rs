//! Whole-store snapshots for backup.
//!
//! A snapshot bundles the outstanding tasks, the completed tasks and the full
//! resolution history into one JSON document, optionally gzip-compressed.

use crate::types::{ResolutionRecord, SectionMap, Task};
use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Snapshot format version (semver).
pub const EXPORT_VERSION: &str = "1.0.0";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub export_version: String,

    /// ISO 8601 timestamp of export
    pub exported_at: String,

    /// Tool name and version that created this export
    pub exported_by: String,

    #[serde(default)]
    pub outstanding: SectionMap,
    #[serde(default)]
    pub completed: Vec<Task>,
    #[serde(default)]
    pub resolutions: Vec<ResolutionRecord>,
}

impl Snapshot {
    /// Create an empty snapshot with current metadata.
    pub fn new() -> Self {
        Self {
            export_version: EXPORT_VERSION.to_string(),
            exported_at: chrono::Local::now().to_rfc3339(),
            exported_by: format!("triage-tasks v{}", env!("CARGO_PKG_VERSION")),
            outstanding: SectionMap::new(),
            completed: Vec::new(),
            resolutions: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a snapshot from a file, plain or gzip-compressed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut bytes = Vec::new();
        File::open(path)
            .and_then(|file| BufReader::new(file).read_to_end(&mut bytes))
            .with_context(|| format!("reading {}", path.display()))?;

        let snapshot = if bytes.starts_with(&GZIP_MAGIC) {
            serde_json::from_reader(GzDecoder::new(bytes.as_slice()))?
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(snapshot)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the snapshot to `path`, gzip-compressed if `gzip` is set.
    pub fn write_to(&self, path: &Path, gzip: bool) -> Result<()> {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let json = self.to_json_pretty()?;
        if gzip {
            let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
            encoder.write_all(json.as_bytes())?;
            encoder.finish()?.flush()?;
        } else {
            let mut writer = BufWriter::new(file);
            writer.write_all(json.as_bytes())?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Number of tasks and records held.
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.outstanding.total(),
            self.completed.len(),
            self.resolutions.len(),
        )
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}
