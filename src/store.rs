//! Durable key-value persistence for embedding vectors with a time-to-live.
//!
//! Writes land in a sibling temp file first, then are renamed into place,
//! so a crash mid-write never corrupts the entry readers see.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    vectors: HashMap<String, Vec<f32>>,
    expires_at_unix_secs: u64,
}

/// Durable key-value store for embedding vectors, keyed by corpus hash.
/// Implementations must be safe for concurrent `load`/`save` calls.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns `None` on cache miss, including an expired entry. The
    /// caller never distinguishes "absent" from "expired".
    async fn load(&self, key: &str) -> Option<HashMap<String, Vec<f32>>>;

    /// Best-effort persistence; failures are logged by the implementation
    /// and never surfaced.
    async fn save(&self, key: &str, vectors: &HashMap<String, Vec<f32>>, ttl: Duration);
}

/// A store that disables persistence entirely: `load` always misses, `save`
/// is a no-op. The correct configuration for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCacheStore;

#[async_trait]
impl CacheStore for NullCacheStore {
    async fn load(&self, _key: &str) -> Option<HashMap<String, Vec<f32>>> {
        None
    }

    async fn save(&self, _key: &str, _vectors: &HashMap<String, Vec<f32>>, _ttl: Duration) {}
}

/// A file-per-key store under a configured directory. Each key maps to one
/// file named by a filesystem-safe encoding of the key.
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.bin"))
    }

    fn now_unix_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn load(&self, key: &str) -> Option<HashMap<String, Vec<f32>>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "router cache store read failed");
                return None;
            }
        };

        let entry: Entry = match bincode::deserialize(&bytes) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "router cache store deserialize failed");
                return None;
            }
        };

        if entry.expires_at_unix_secs <= Self::now_unix_secs() {
            return None;
        }

        Some(entry.vectors)
    }

    async fn save(&self, key: &str, vectors: &HashMap<String, Vec<f32>>, ttl: Duration) {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(error = %e, dir = %self.dir.display(), "failed to create router cache store directory");
            return;
        }

        let entry = Entry {
            vectors: vectors.clone(),
            expires_at_unix_secs: Self::now_unix_secs() + ttl.as_secs(),
        };

        let encoded = match bincode::serialize(&entry) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "failed to serialize router cache store entry");
                return;
            }
        };

        let path = self.path_for(key);
        let tmp_path = path.with_extension("bin.tmp");

        if let Err(e) = tokio::fs::write(&tmp_path, &encoded).await {
            warn!(error = %e, path = %tmp_path.display(), "failed to write router cache store temp file");
            return;
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            warn!(error = %e, path = %path.display(), "failed to rename router cache store temp file");
        }
    }
}
