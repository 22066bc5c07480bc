//! Debounced preference writer
//!
//! One pending-write slot per channel. A new request replaces the pending one
//! and restarts the window, so only the last value inside a debounce window
//! is ever persisted.

use super::{ChannelPreference, PreferenceStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

struct PendingWrite {
    generation: u64,
    preference: ChannelPreference,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Slots {
    next_generation: u64,
    pending: HashMap<String, PendingWrite>,
}

pub struct PreferenceWriter {
    store: Arc<dyn PreferenceStore>,
    debounce: Duration,
    slots: Arc<Mutex<Slots>>,
}

impl PreferenceWriter {
    pub fn new(store: Arc<dyn PreferenceStore>, debounce: Duration) -> Self {
        Self {
            store,
            debounce,
            slots: Arc::new(Mutex::new(Slots::default())),
        }
    }

    pub fn store(&self) -> &Arc<dyn PreferenceStore> {
        &self.store
    }

    /// Schedule a write, replacing any pending write for the same channel
    ///
    /// With a zero debounce window, or outside a runtime, the write goes
    /// straight to the store.
    pub fn schedule(&self, channel_id: &str, preference: ChannelPreference) {
        let runtime = tokio::runtime::Handle::try_current().ok();
        let Some(runtime) = runtime.filter(|_| !self.debounce.is_zero()) else {
            self.cancel_pending(channel_id);
            self.store.save(channel_id, preference);
            return;
        };

        let mut slots = self.slots.lock();
        slots.next_generation += 1;
        let generation = slots.next_generation;

        if let Some(old) = slots.pending.remove(channel_id) {
            if let Some(handle) = old.handle {
                handle.abort();
            }
            debug!(channel_id, "Coalesced pending preference write");
        }

        let store = Arc::clone(&self.store);
        let shared = Arc::clone(&self.slots);
        let debounce = self.debounce;
        let id = channel_id.to_string();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            let due = {
                let mut slots = shared.lock();
                match slots.pending.get(&id) {
                    Some(p) if p.generation == generation => slots.pending.remove(&id),
                    // Superseded after the sleep finished
                    _ => None,
                }
            };
            if let Some(write) = due {
                store.save(&id, write.preference);
            }
        });

        slots.pending.insert(
            channel_id.to_string(),
            PendingWrite {
                generation,
                preference,
                handle: Some(handle),
            },
        );
    }

    /// Number of channels with a write waiting for its window to close
    pub fn pending_count(&self) -> usize {
        self.slots.lock().pending.len()
    }

    /// Write every pending value now and wait for the store to settle
    pub async fn flush(&self) {
        let drained: Vec<(String, PendingWrite)> = self.slots.lock().pending.drain().collect();
        for (channel_id, write) in drained {
            if let Some(handle) = write.handle {
                handle.abort();
            }
            self.store.save(&channel_id, write.preference);
        }
        self.store.flush().await;
    }

    fn cancel_pending(&self, channel_id: &str) {
        if let Some(old) = self.slots.lock().pending.remove(channel_id) {
            if let Some(handle) = old.handle {
                handle.abort();
            }
        }
    }
}

impl Drop for PreferenceWriter {
    fn drop(&mut self) {
        for (_, write) in self.slots.lock().pending.drain() {
            if let Some(handle) = write.handle {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    fn pref(volume: f32) -> ChannelPreference {
        ChannelPreference {
            volume,
            variant: "light".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_writes_coalesce_to_last_value() {
        let store = Arc::new(MemoryStore::new());
        let writer = PreferenceWriter::new(store.clone(), Duration::from_millis(500));

        for step in 1..=10 {
            writer.schedule("rain", pref(step as f32 / 10.0));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(store.history().is_empty());
        assert_eq!(writer.pending_count(), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;

        let history = store.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].1.volume, 1.0);
        assert_eq!(writer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channels_have_independent_slots() {
        let store = Arc::new(MemoryStore::new());
        let writer = PreferenceWriter::new(store.clone(), Duration::from_millis(500));

        writer.schedule("rain", pref(0.2));
        writer.schedule("fire", pref(0.9));
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(store.history().len(), 2);
        assert_eq!(store.get("fire").unwrap().volume, 0.9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_pending_immediately() {
        let store = Arc::new(MemoryStore::new());
        let writer = PreferenceWriter::new(store.clone(), Duration::from_secs(10));

        writer.schedule("rain", pref(0.4));
        writer.flush().await;
        assert_eq!(store.get("rain").unwrap().volume, 0.4);

        // The aborted timer never writes a second time
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn test_zero_window_writes_through() {
        let store = Arc::new(MemoryStore::new());
        let writer = PreferenceWriter::new(store.clone(), Duration::ZERO);
        writer.schedule("rain", pref(0.7));
        assert_eq!(store.get("rain").unwrap().volume, 0.7);
    }
}
