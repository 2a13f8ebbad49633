//! Response cache: a small capability trait with a real on-disk store,
//! an in-memory store, and a no-op stand-in for when caching is off.

use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    time::SystemTime,
};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::CacheError,
    model::{Category, Location, QueryParams},
    time::{DATE_PATTERN, TimeUnit, floor, format},
};

pub trait Cache {
    fn contains(&self, key: &CacheKey) -> bool;

    /// Fails with [`CacheError::KeyNotFound`] on a miss.
    fn get(&self, key: &CacheKey) -> Result<Value, CacheError>;

    fn set(&self, key: &CacheKey, value: &Value) -> Result<(), CacheError>;
}

/// Identifies one raw upstream response. Credentials are never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(
        location: Location,
        date: &DateTime<Utc>,
        category: Category,
        params: &QueryParams,
    ) -> Self {
        let day = format(&floor(date, TimeUnit::Day), DATE_PATTERN);
        Self(format!(
            "{}_{}_{}_{}_{}_{}",
            category.as_str(),
            location.lat,
            location.lon,
            day,
            params.units.as_str(),
            params.lang.as_deref().unwrap_or("default"),
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn file_name(&self) -> String {
        let safe: String = self
            .0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || "-._".contains(c) {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{safe}.json")
    }
}

/// Cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

impl Cache for NullCache {
    fn contains(&self, _key: &CacheKey) -> bool {
        false
    }

    fn get(&self, key: &CacheKey) -> Result<Value, CacheError> {
        Err(CacheError::KeyNotFound(key.as_str().to_string()))
    }

    fn set(&self, _key: &CacheKey, _value: &Value) -> Result<(), CacheError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RefCell<HashMap<CacheKey, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

}

impl Cache for MemoryCache {
    fn contains(&self, key: &CacheKey) -> bool {
        self.entries.borrow().contains_key(key)
    }

    fn get(&self, key: &CacheKey) -> Result<Value, CacheError> {
        self.entries
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::KeyNotFound(key.as_str().to_string()))
    }

    fn set(&self, key: &CacheKey, value: &Value) -> Result<(), CacheError> {
        self.entries.borrow_mut().insert(key.clone(), value.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    #[default]
    LeastRecentlyStored,
    None,
}

impl EvictionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::LeastRecentlyStored => "least-recently-stored",
            EvictionPolicy::None => "none",
        }
    }
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "least-recently-stored" => Ok(EvictionPolicy::LeastRecentlyStored),
            "none" => Ok(EvictionPolicy::None),
            _ => Err(CacheError::UnknownPolicy(s.to_string())),
        }
    }
}

/// One JSON file per entry, bounded by total size on disk.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    size_limit: u64,
    policy: EvictionPolicy,
}

impl FileCache {
    pub fn open(dir: &Path, size_limit: u64, policy: EvictionPolicy) -> Result<Self, CacheError> {
        fs::create_dir_all(dir).map_err(|e| CacheError::Io(dir.to_path_buf(), e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            size_limit,
            policy,
        })
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn entries(&self) -> Result<Vec<(PathBuf, u64, SystemTime)>, CacheError> {
        let io_err = |e| CacheError::Io(self.dir.clone(), e);
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let meta = entry.metadata().map_err(|e| CacheError::Io(path.clone(), e))?;
            let stored = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((path, meta.len(), stored));
        }
        Ok(entries)
    }

    /// Remove the oldest entries until the total fits the size limit. The
    /// entry at `keep` (the one just stored) is never removed, even when it
    /// alone is over the limit.
    fn evict(&self, keep: &Path) -> Result<(), CacheError> {
        if self.policy == EvictionPolicy::None {
            return Ok(());
        }

        let mut entries = self.entries()?;
        let mut total: u64 = entries.iter().map(|(_, len, _)| len).sum();
        if total <= self.size_limit {
            return Ok(());
        }

        entries.sort_by_key(|(_, _, stored)| *stored);
        for (path, len, _) in entries {
            if total <= self.size_limit {
                break;
            }
            if path.as_path() == keep {
                continue;
            }
            debug!("Evicting cache entry {}", path.display());
            fs::remove_file(&path).map_err(|e| CacheError::Io(path.clone(), e))?;
            total -= len;
        }
        if total > self.size_limit {
            debug!(
                "Cache entry {} alone exceeds the {} byte limit",
                keep.display(),
                self.size_limit
            );
        }
        Ok(())
    }
}

impl Cache for FileCache {
    fn contains(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }

    fn get(&self, key: &CacheKey) -> Result<Value, CacheError> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CacheError::KeyNotFound(key.as_str().to_string()));
            }
            Err(e) => return Err(CacheError::Io(path, e)),
        };
        serde_json::from_str(&contents).map_err(|e| CacheError::Serde(path, e))
    }

    fn set(&self, key: &CacheKey, value: &Value) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let contents =
            serde_json::to_string(value).map_err(|e| CacheError::Serde(path.clone(), e))?;
        fs::write(&path, contents).map_err(|e| CacheError::Io(path.clone(), e))?;
        self.evict(&path)
    }
}

/// `[cache]` table of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Defaults to the platform cache directory.
    pub location: Option<PathBuf>,

    pub size_limit_mb: u64,

    /// `least-recently-stored` or `none`.
    pub eviction_policy: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            location: None,
            size_limit_mb: 1000,
            eviction_policy: EvictionPolicy::default().as_str().to_string(),
        }
    }
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn resolve_location(&self) -> Result<PathBuf, CacheError> {
        if let Some(location) = &self.location {
            return Ok(location.clone());
        }
        ProjectDirs::from("dev", "owm", "owm-cli")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .ok_or(CacheError::NoLocation)
    }
}

/// Pick the cache implementation described by `config`.
pub fn open_cache(config: &CacheConfig) -> Result<Box<dyn Cache>, CacheError> {
    if !config.enabled {
        return Ok(Box::new(NullCache));
    }

    let policy: EvictionPolicy = config.eviction_policy.parse()?;
    let dir = config.resolve_location()?;
    debug!("Using response cache at {}", dir.display());
    let cache = FileCache::open(&dir, config.size_limit_mb.saturating_mul(1_000_000), policy)?;
    Ok(Box::new(cache))
}
