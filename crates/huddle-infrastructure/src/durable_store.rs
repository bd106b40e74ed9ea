//! `DurableStore` implementations.

use crate::paths::HuddlePaths;
use crate::storage::AtomicTomlFile;
use async_trait::async_trait;
use huddle_core::config::StorageConfig;
use huddle_core::storage::DurableStore;
use huddle_core::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// On-disk layout of the durable store.
///
/// ```toml
/// [entries]
/// muted_conversations = '["team-42"]'
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DurableTable {
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// Key-value store kept in a single TOML file.
///
/// Nothing is cached: every `get` reads the file under a shared lock, so
/// values written by another process are visible immediately and a read
/// never lands in the middle of a `put`.
#[derive(Clone)]
pub struct TomlDurableStore {
    file: Arc<AtomicTomlFile<DurableTable>>,
}

impl TomlDurableStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: Arc::new(AtomicTomlFile::new(path)),
        }
    }

    /// Opens the store at `[storage] durable_store_path`, or at
    /// `HuddlePaths::durable_store_file()` when unset.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let path = match &config.durable_store_path {
            Some(path) => path.clone(),
            None => HuddlePaths::durable_store_file()?,
        };
        Ok(Self::new(path))
    }

    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }
}

#[async_trait]
impl DurableStore for TomlDurableStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let file = self.file.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let table = file
                .load()
                .map_err(|e| ChatError::durable_read(e.to_string()))?;
            Ok(table.and_then(|mut table| table.entries.remove(&key)))
        })
        .await
        .map_err(|e| ChatError::internal(format!("Failed to join task: {}", e)))?
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        let file = self.file.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            file.update(DurableTable::default(), |table| {
                table.entries.insert(key, value);
                Ok(())
            })
            .map(|_| ())
            .map_err(|e| ChatError::durable_write(e.to_string()))
        })
        .await
        .map_err(|e| ChatError::internal(format!("Failed to join task: {}", e)))?
    }
}

/// In-process store with switchable failures.
#[derive(Default)]
pub struct InMemoryDurableStore {
    entries: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `get` fail with `DurableRead`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `put` fail with `DurableWrite`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ChatError::durable_read("store unavailable"));
        }
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ChatError::durable_write("store unavailable"));
        }
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}
