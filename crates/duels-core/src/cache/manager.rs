use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::User;

const USER_CACHE: &str = "user";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    /// Minutes since caching. Clock skew reads as zero.
    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes().max(0)
    }
}

/// Holds the signed-in user's profile, optionally mirrored to disk so that a
/// restarted client knows who was signed in without another request.
pub struct CacheManager {
    cache_dir: Option<PathBuf>,
    user: RwLock<Option<CachedData<User>>>,
}

impl CacheManager {
    /// Disk-backed cache in `cache_dir`. A cached profile already on disk is
    /// loaded; an unreadable one is ignored.
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;

        let manager = Self {
            cache_dir: Some(cache_dir),
            user: RwLock::new(None),
        };
        match manager.load::<User>(USER_CACHE) {
            Ok(user) => *manager.write() = user,
            Err(e) => warn!(error = %e, "Ignoring unreadable user cache"),
        }
        Ok(manager)
    }

    /// Process-local cache with no disk mirror.
    pub fn in_memory() -> Self {
        Self {
            cache_dir: None,
            user: RwLock::new(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<CachedData<User>>> {
        self.user.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<CachedData<User>>> {
        self.user.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cache_path(&self, name: &str) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", name)))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let Some(path) = self.cache_path(name) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;
        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;
        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, cached: &CachedData<T>) -> Result<()> {
        let Some(path) = self.cache_path(name) else {
            return Ok(());
        };
        let contents = serde_json::to_string_pretty(cached)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        match self.cache_path(name) {
            Some(path) if path.exists() => std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove cache file: {}", name)),
            _ => Ok(()),
        }
    }

    // ===== User =====

    pub fn user(&self) -> Option<User> {
        self.read().as_ref().map(|cached| cached.data.clone())
    }

    pub fn cached_user(&self) -> Option<CachedData<User>> {
        self.read().clone()
    }

    /// Caches `user`. Disk failures are logged; the in-memory copy is kept.
    pub fn store_user(&self, user: User) {
        let cached = CachedData::new(user);
        if let Err(e) = self.save(USER_CACHE, &cached) {
            warn!(error = %e, "Failed to persist user cache");
        }
        debug!(user_id = %cached.data.id, "User cached");
        *self.write() = Some(cached);
    }

    pub fn clear(&self) {
        *self.write() = None;
        if let Err(e) = self.remove(USER_CACHE) {
            warn!(error = %e, "Failed to remove user cache");
        }
    }
}
