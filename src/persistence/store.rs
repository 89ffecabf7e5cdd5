use crate::world::snapshot::MapSnapshot;
use lru::LruCache;
use std::fs;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Parse-cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64) / (total as f64)
        }
    }
}

/// Map snapshot storage: one JSON document per key under
/// `<root>/save/maps/`, the previous version kept as `<key>.json#`.
/// Recently parsed snapshots are held in an LRU cache so repeated house
/// loads skip the disk.
pub struct SnapshotStore {
    root: PathBuf,
    cache: LruCache<String, MapSnapshot>,
    stats: CacheStats,
}

impl SnapshotStore {
    pub fn new(root: PathBuf, cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        SnapshotStore {
            root,
            cache: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn save_snapshot(&mut self, key: &str, snapshot: &MapSnapshot) -> Result<(), String> {
        let dir = self.map_dir();
        fs::create_dir_all(&dir).map_err(|err| {
            format!("snapshot dir create failed for {}: {}", dir.display(), err)
        })?;
        let path = self.snapshot_path(key);
        let backup = self.backup_path(key);
        let data = serde_json::to_string(snapshot)
            .map_err(|err| format!("snapshot encode failed for {}: {}", key, err))?;
        if path.exists() {
            fs::copy(&path, &backup).map_err(|err| {
                format!("snapshot backup failed for {}: {}", backup.display(), err)
            })?;
        }
        fs::write(&path, data)
            .map_err(|err| format!("snapshot write failed for {}: {}", path.display(), err))?;
        self.put_cached(key, snapshot.clone());
        Ok(())
    }

    pub fn load_snapshot(&mut self, key: &str) -> Result<Option<MapSnapshot>, String> {
        if let Some(snapshot) = self.cache.get(&normalize_key(key)) {
            self.stats.hits += 1;
            return Ok(Some(snapshot.clone()));
        }
        self.stats.misses += 1;

        let path = self.snapshot_path(key);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(format!(
                    "snapshot read failed for {}: {}",
                    path.display(),
                    err
                ))
            }
        };
        let snapshot = match serde_json::from_str::<MapSnapshot>(&data) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                match self.load_backup(key)? {
                    Some(fallback) => {
                        eprintln!(
                            "meadow: snapshot parse failed for {}, using backup: {}",
                            path.display(),
                            err
                        );
                        fallback
                    }
                    None => {
                        return Err(format!(
                            "snapshot parse failed for {}: {}",
                            path.display(),
                            err
                        ))
                    }
                }
            }
        };
        self.stats.loads += 1;
        self.put_cached(key, snapshot.clone());
        Ok(Some(snapshot))
    }

    /// Parse a snapshot out of an in-memory JSON document (the account
    /// registry stores house saves inline).
    pub fn parse_inline(key: &str, data: &str) -> Result<MapSnapshot, String> {
        serde_json::from_str(data)
            .map_err(|err| format!("snapshot parse failed for {}: {}", key, err))
    }

    pub fn encode_inline(snapshot: &MapSnapshot) -> Result<String, String> {
        serde_json::to_string(snapshot).map_err(|err| format!("snapshot encode failed: {}", err))
    }

    fn load_backup(&self, key: &str) -> Result<Option<MapSnapshot>, String> {
        let backup = self.backup_path(key);
        let data = match fs::read_to_string(&backup) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(format!(
                    "snapshot backup read failed for {}: {}",
                    backup.display(),
                    err
                ))
            }
        };
        match serde_json::from_str(&data) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(_) => Ok(None),
        }
    }

    fn put_cached(&mut self, key: &str, snapshot: MapSnapshot) {
        if self
            .cache
            .push(normalize_key(key), snapshot)
            .map_or(false, |(old_key, _)| old_key != normalize_key(key))
        {
            self.stats.evictions += 1;
        }
    }

    fn map_dir(&self) -> PathBuf {
        self.root.join("save").join("maps")
    }

    fn snapshot_path(&self, key: &str) -> PathBuf {
        self.map_dir().join(format!("{}.json", normalize_key(key)))
    }

    fn backup_path(&self, key: &str) -> PathBuf {
        self.map_dir().join(format!("{}.json#", normalize_key(key)))
    }
}

/// Keys become file names; anything outside a safe set is replaced.
fn normalize_key(key: &str) -> String {
    key.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
