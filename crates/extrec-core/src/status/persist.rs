//! Durable snapshot of the status store (JSON under the XDG state dir).
//!
//! The whole store is rewritten on every mutation and loaded in full at
//! startup; job volume is low enough that write amplification is a fair
//! trade for trivial crash-restart recovery.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::types::ExtractionStatus;

/// On-disk form of the whole store. Keys are catalog ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default = "default_version")]
    pub version: u8,
    pub statuses: HashMap<String, ExtractionStatus>,
}

fn default_version() -> u8 {
    1
}

/// Storage backend for the snapshot. Injected so the store runs against a
/// file in production and in-memory in tests.
pub trait SnapshotBackend: Send + Sync {
    fn save(&self, snapshot: &StatusSnapshot) -> Result<()>;
    /// Returns None when no snapshot exists yet.
    fn load(&self) -> Result<Option<StatusSnapshot>>;
}

/// Default snapshot path: `~/.local/state/extrec/statuses.json`.
pub fn default_snapshot_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("extrec")?;
    Ok(xdg_dirs.get_state_home().join("statuses.json"))
}

/// File-backed snapshot storage. Save creates the parent directory if
/// needed; load treats a missing file as an empty store.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotBackend for JsonFileBackend {
    fn save(&self, snapshot: &StatusSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(snapshot).context("serialize status snapshot")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("write status snapshot: {}", self.path.display()))?;
        Ok(())
    }

    fn load(&self) -> Result<Option<StatusSnapshot>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("read status snapshot: {}", self.path.display()))
            }
        };
        let snapshot: StatusSnapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse status snapshot: {}", self.path.display()))?;
        Ok(Some(snapshot))
    }
}

/// In-memory backend (no disk I/O). Round-trips through JSON so tests see
/// exactly what the file backend would persist.
#[derive(Default)]
pub struct MemoryBackend {
    cell: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotBackend for MemoryBackend {
    fn save(&self, snapshot: &StatusSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot).context("serialize status snapshot")?;
        *self.cell.lock().unwrap() = Some(json);
        Ok(())
    }

    fn load(&self) -> Result<Option<StatusSnapshot>> {
        let guard = self.cell.lock().unwrap();
        match guard.as_deref() {
            None => Ok(None),
            Some(json) => {
                let snapshot = serde_json::from_str(json).context("parse status snapshot")?;
                Ok(Some(snapshot))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::types::ExtractionStatus;

    fn snapshot_with(id: &str) -> StatusSnapshot {
        let mut statuses = HashMap::new();
        statuses.insert(id.to_string(), ExtractionStatus::new(id, 4, 1_700_000_000));
        StatusSnapshot {
            version: 1,
            statuses,
        }
    }

    #[test]
    fn file_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("state").join("statuses.json"));

        assert!(backend.load().unwrap().is_none());

        backend.save(&snapshot_with("cat-1")).unwrap();
        let loaded = backend.load().unwrap().expect("snapshot exists");
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.statuses.len(), 1);
        let status = &loaded.statuses["cat-1"];
        assert_eq!(status.catalog_id, "cat-1");
        assert_eq!(status.total_pages, 4);
        assert!(!status.is_complete);
    }

    #[test]
    fn file_backend_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statuses.json");
        std::fs::write(&path, "{not json").unwrap();
        let backend = JsonFileBackend::new(path);
        assert!(backend.load().is_err());
    }

    #[test]
    fn memory_backend_roundtrip() {
        let backend = MemoryBackend::new();
        assert!(backend.load().unwrap().is_none());
        backend.save(&snapshot_with("cat-9")).unwrap();
        let loaded = backend.load().unwrap().expect("snapshot exists");
        assert!(loaded.statuses.contains_key("cat-9"));
    }
}
