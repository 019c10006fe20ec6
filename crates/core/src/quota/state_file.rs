//! Durable copy of the quota pause deadline.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
struct PauseRecord {
    paused_until: Option<DateTime<Utc>>,
}

/// JSON file holding the current pause deadline.
#[derive(Debug, Clone)]
pub struct PauseFile {
    path: PathBuf,
}

impl PauseFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read the stored deadline. Missing or unreadable files mean "not paused".
    pub fn load(&self) -> Option<DateTime<Utc>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read {:?}: {}", self.path, e);
                return None;
            }
        };
        match serde_json::from_str::<PauseRecord>(&raw) {
            Ok(record) => record.paused_until,
            Err(e) => {
                warn!("Ignoring malformed pause file {:?}: {}", self.path, e);
                None
            }
        }
    }

    pub fn store(&self, paused_until: Option<DateTime<Utc>>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&PauseRecord { paused_until })
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, json)
    }
}
