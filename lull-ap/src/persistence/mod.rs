//! Channel preference persistence
//!
//! Key-value store of `{volume, variant}` per channel identifier. Loading is
//! synchronous at construction; saving is fire-and-forget. Rapid volume
//! changes are coalesced by [`PreferenceWriter`] before they reach a store.

mod json_store;
mod writer;

pub use json_store::JsonFileStore;
pub use writer::PreferenceWriter;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted settings for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPreference {
    pub volume: f32,
    pub variant: String,
}

/// Persisted shape: `{channelId: {volume, variant}}`
pub type PreferenceMap = HashMap<String, ChannelPreference>;

/// Preference storage backend
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Load every stored preference; unreadable storage yields an empty map
    fn load(&self) -> PreferenceMap;

    /// Store one channel's preference without waiting for durability
    fn save(&self, channel_id: &str, preference: ChannelPreference);

    /// Wait until every accepted save is durable
    async fn flush(&self) {}
}

/// In-memory store for headless runs and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<PreferenceMap>,
    history: Mutex<Vec<(String, ChannelPreference)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with preferences
    pub fn with_preferences(values: PreferenceMap) -> Self {
        Self {
            values: Mutex::new(values),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self, channel_id: &str) -> Option<ChannelPreference> {
        self.values.lock().get(channel_id).cloned()
    }

    /// Every save in arrival order
    pub fn history(&self) -> Vec<(String, ChannelPreference)> {
        self.history.lock().clone()
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    fn load(&self) -> PreferenceMap {
        self.values.lock().clone()
    }

    fn save(&self, channel_id: &str, preference: ChannelPreference) {
        self.history
            .lock()
            .push((channel_id.to_string(), preference.clone()));
        self.values.lock().insert(channel_id.to_string(), preference);
    }
}
