//! Periodic JSON snapshots of the world.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::world::WorldSnapshot;

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub written_at: String,
    pub snapshot: WorldSnapshot,
}

pub struct SnapshotWriter {
    output_dir: PathBuf,
    interval_periods: u64,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl AsRef<Path>, interval_periods: u64) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            interval_periods,
        }
    }

    pub fn should_write(&self, period: usize) -> bool {
        self.interval_periods != 0 && period as u64 % self.interval_periods == 0
    }

    /// Writes `<dir>/<scenario>/period_NNNN.json` when the period falls on the interval.
    pub fn maybe_write(&self, snapshot: &WorldSnapshot) -> Result<Option<PathBuf>> {
        if !self.should_write(snapshot.period) {
            return Ok(None);
        }
        let dir = self.output_dir.join(&snapshot.scenario);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot dir {}", dir.display()))?;
        let path = dir.join(format!("period_{:04}.json", snapshot.period));
        write_snapshot(&path, snapshot)?;
        Ok(Some(path))
    }
}

pub fn write_snapshot(path: &Path, snapshot: &WorldSnapshot) -> Result<()> {
    let file = SnapshotFile {
        written_at: chrono::Local::now().to_rfc3339(),
        snapshot: snapshot.clone(),
    };
    let json = serde_json::to_string_pretty(&file)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<SnapshotFile> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let file = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
    Ok(file)
}
