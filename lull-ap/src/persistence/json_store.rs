//! JSON file preference store
//!
//! Keeps the full preference map in memory and rewrites the file on every
//! save. Writes go to a temp file that is renamed over the target, and are
//! serialized through a gate so the newest snapshot always lands last.

use super::{ChannelPreference, PreferenceMap, PreferenceStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct JsonFileStore {
    path: PathBuf,
    snapshot: Arc<Mutex<PreferenceMap>>,
    write_gate: Arc<tokio::sync::Mutex<()>>,
}

impl JsonFileStore {
    /// Open the store, reading existing preferences
    ///
    /// A missing file is an empty store; an unreadable or corrupt file is
    /// logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let snapshot = match read_preferences(&path) {
            Ok(map) => {
                debug!("Loaded {} channel preference(s) from {}", map.len(), path.display());
                map
            }
            Err(e) => {
                warn!("Ignoring preferences at {}: {}", path.display(), e);
                PreferenceMap::new()
            }
        };

        Self {
            path,
            snapshot: Arc::new(Mutex::new(snapshot)),
            write_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PreferenceStore for JsonFileStore {
    fn load(&self) -> PreferenceMap {
        self.snapshot.lock().clone()
    }

    fn save(&self, channel_id: &str, preference: ChannelPreference) {
        self.snapshot
            .lock()
            .insert(channel_id.to_string(), preference);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // No runtime (e.g. during teardown): write inline
            let map = self.snapshot.lock().clone();
            if let Err(e) = write_atomic(&self.path, &map) {
                warn!("Failed to save preferences: {}", e);
            }
            return;
        };

        let path = self.path.clone();
        let snapshot = Arc::clone(&self.snapshot);
        let gate = Arc::clone(&self.write_gate);
        handle.spawn(async move {
            let _guard = gate.lock().await;
            // Snapshot taken under the gate: the last writer writes the newest state
            let map = snapshot.lock().clone();
            match tokio::task::spawn_blocking(move || write_atomic(&path, &map)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Failed to save preferences: {}", e),
                Err(e) => warn!("Preference write task failed: {}", e),
            }
        });
    }

    async fn flush(&self) {
        let _guard = self.write_gate.lock().await;
        let map = self.snapshot.lock().clone();
        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || write_atomic(&path, &map)).await {
            Ok(Ok(())) => debug!("Preferences flushed to {}", self.path.display()),
            Ok(Err(e)) => warn!("Failed to flush preferences: {}", e),
            Err(e) => warn!("Preference flush task failed: {}", e),
        }
    }
}

fn read_preferences(path: &Path) -> Result<PreferenceMap> {
    if !path.exists() {
        return Ok(PreferenceMap::new());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Persistence(format!("invalid preferences JSON: {}", e)))
}

fn write_atomic(path: &Path, map: &PreferenceMap) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(map)
        .map_err(|e| Error::Persistence(format!("failed to encode preferences: {}", e)))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
