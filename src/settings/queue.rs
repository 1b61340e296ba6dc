//! Background settings persistence through a single-writer queue.
//!
//! The core is synchronous and single-threaded, and its converse-update guard
//! relies on that. To move file I/O off the caller's thread without breaking
//! it, [`QueuedStore`] keeps an in-memory snapshot for reads and forwards every
//! write, in order, over an unbounded mpsc channel to one blocking writer task
//! that owns the backing store.
//!
//! ```text
//! RunParameters ──save/flush──> QueuedStore ──mpsc──> writer task ──> FileStore
//!                 <──load────── (snapshot)
//! ```

use super::{SettingValue, SettingsExt, SettingsStore};
use crate::error::SettingsError;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug)]
enum WriteCommand {
    Save(String, SettingValue),
    Flush,
}

/// Store whose writes are applied by a background task.
pub struct QueuedStore<S> {
    snapshot: BTreeMap<String, SettingValue>,
    tx: mpsc::UnboundedSender<WriteCommand>,
    writer: JoinHandle<S>,
}

impl<S> QueuedStore<S>
where
    S: SettingsStore + Send + 'static,
{
    /// Moves `backing` into a writer task. Must be called inside a Tokio runtime.
    pub fn spawn(backing: S) -> Self {
        let snapshot = backing
            .keys()
            .into_iter()
            .filter_map(|key| backing.load_logged(&key).map(|value| (key, value)))
            .collect();
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::task::spawn_blocking(move || run_writer(backing, rx));
        Self {
            snapshot,
            tx,
            writer,
        }
    }

    /// Drains the queue, flushes, and hands the backing store back.
    pub async fn close(self) -> Result<S, SettingsError> {
        let Self { tx, writer, .. } = self;
        drop(tx);
        writer.await.map_err(|e| {
            warn!(error = %e, "settings writer task failed");
            SettingsError::WriterClosed
        })
    }

    fn send(&self, command: WriteCommand) -> Result<(), SettingsError> {
        self.tx
            .send(command)
            .map_err(|_| SettingsError::WriterClosed)
    }
}

fn run_writer<S: SettingsStore>(mut backing: S, mut rx: mpsc::UnboundedReceiver<WriteCommand>) -> S {
    while let Some(command) = rx.blocking_recv() {
        match command {
            WriteCommand::Save(key, value) => backing.save_logged(&key, value),
            WriteCommand::Flush => backing.flush_logged(),
        }
    }
    backing.flush_logged();
    debug!("settings writer stopped");
    backing
}

impl<S> SettingsStore for QueuedStore<S>
where
    S: SettingsStore + Send + 'static,
{
    fn load(&self, key: &str) -> Result<Option<SettingValue>, SettingsError> {
        Ok(self.snapshot.get(key).cloned())
    }

    fn keys(&self) -> Vec<String> {
        self.snapshot.keys().cloned().collect()
    }

    fn save(&mut self, key: &str, value: SettingValue) -> Result<(), SettingsError> {
        self.snapshot.insert(key.to_string(), value.clone());
        self.send(WriteCommand::Save(key.to_string(), value))
    }

    fn flush(&mut self) -> Result<(), SettingsError> {
        self.send(WriteCommand::Flush)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryStore;

    #[tokio::test]
    async fn reads_see_writes_before_the_writer_runs() {
        let mut store = QueuedStore::spawn(MemoryStore::new());
        store.save_text("SampleName", "S1");
        assert_eq!(store.load_text("SampleName").as_deref(), Some("S1"));
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn writes_reach_backing_store_in_order() {
        let mut initial = MemoryStore::new();
        initial.save_int("ActiveTab", 2);

        let mut store = QueuedStore::spawn(initial);
        assert_eq!(store.load_int("ActiveTab"), Some(2));
        for i in 0..50 {
            store.save_int("ActiveTab", i);
        }
        store.flush().unwrap();

        let backing = store.close().await.unwrap();
        assert_eq!(backing.load_int("ActiveTab"), Some(49));
        // explicit flush plus the final one on close
        assert_eq!(backing.flush_count(), 2);
    }
}
