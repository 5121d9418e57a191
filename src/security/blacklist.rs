//! Persistent source blacklist.
//!
//! # Responsibilities
//! - Own the append-only blacklist file (one source address per line)
//! - Mirror its contents in memory, reloading when the file's mtime changes
//! - Append new entries idempotently
//!
//! # Design Decisions
//! - Hand edits to the file are picked up on the next query, no restart
//! - One mutex covers refresh+query and refresh+append, so no caller ever
//!   observes a half-reloaded cache
//! - A missing file is recreated empty, never an error
//! - Entries are never removed by the proxy itself

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use thiserror::Error;

use crate::observability::metrics;

/// Errors raised by the blacklist file.
#[derive(Debug, Error)]
#[error("blacklist file {path}: {source}")]
pub struct BlacklistError {
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl BlacklistError {
    fn new(path: &Path, source: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Default)]
struct BlacklistCache {
    entries: HashSet<String>,
    /// Modification time the entries were loaded at.
    mtime: Option<SystemTime>,
}

/// File-backed set of blacklisted source identifiers.
pub struct BlacklistStore {
    path: PathBuf,
    cache: Mutex<BlacklistCache>,
}

impl BlacklistStore {
    /// Open (creating if needed) the blacklist file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BlacklistError> {
        let path = path.into();
        ensure_file(&path)?;
        tracing::info!(path = %path.display(), "Blacklist file ready");
        Ok(Self {
            path,
            cache: Mutex::new(BlacklistCache::default()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `id` is blacklisted, reloading the file first if it changed.
    pub fn is_blacklisted(&self, id: &str) -> Result<bool, BlacklistError> {
        let mut cache = self.lock();
        self.refresh(&mut cache)?;
        Ok(cache.entries.contains(id))
    }

    /// Blacklist `id`. Returns `false` if it was already present.
    pub fn add(&self, id: &str) -> Result<bool, BlacklistError> {
        let mut cache = self.lock();
        self.refresh(&mut cache)?;
        if cache.entries.contains(id) {
            return Ok(false);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| BlacklistError::new(&self.path, e))?;
        writeln!(file, "{id}").map_err(|e| BlacklistError::new(&self.path, e))?;
        cache.entries.insert(id.to_string());

        tracing::warn!(source = %id, path = %self.path.display(), "Source blacklisted");
        metrics::record_blacklist_addition();
        Ok(true)
    }

    /// Current entries, sorted.
    pub fn entries(&self) -> Result<Vec<String>, BlacklistError> {
        let mut cache = self.lock();
        self.refresh(&mut cache)?;
        let mut entries: Vec<String> = cache.entries.iter().cloned().collect();
        entries.sort();
        Ok(entries)
    }

    pub fn len(&self) -> Result<usize, BlacklistError> {
        let mut cache = self.lock();
        self.refresh(&mut cache)?;
        Ok(cache.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, BlacklistError> {
        Ok(self.len()? == 0)
    }

    // The cache is a plain set; a panic elsewhere cannot leave it torn.
    fn lock(&self) -> MutexGuard<'_, BlacklistCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh(&self, cache: &mut BlacklistCache) -> Result<(), BlacklistError> {
        let mtime = match modified(&self.path) {
            Ok(mtime) => mtime,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "Blacklist file missing, recreating");
                ensure_file(&self.path)?;
                cache.mtime = None;
                modified(&self.path).map_err(|e| BlacklistError::new(&self.path, e))?
            }
            Err(e) => return Err(BlacklistError::new(&self.path, e)),
        };

        if cache.mtime == Some(mtime) {
            return Ok(());
        }

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(BlacklistError::new(&self.path, e)),
        };
        cache.entries = parse_entries(&bytes);
        cache.mtime = Some(mtime);

        tracing::debug!(
            path = %self.path.display(),
            entries = cache.entries.len(),
            "Blacklist reloaded"
        );
        Ok(())
    }
}

fn modified(path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

fn ensure_file(path: &Path) -> Result<(), BlacklistError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| BlacklistError::new(path, e))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(drop)
        .map_err(|e| BlacklistError::new(path, e))
}

/// Parse file contents into entries. Undecodable bytes are dropped, lines
/// trimmed, blank lines skipped.
fn parse_entries(bytes: &[u8]) -> HashSet<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(|line| line.replace(char::REPLACEMENT_CHARACTER, ""))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("blacklist-{}.txt", uuid::Uuid::new_v4()))
    }

    /// Rewrite the file as an operator would, forcing a distinct mtime.
    fn hand_edit(path: &Path, contents: &[u8], bump_secs: u64) {
        fs::write(path, contents).unwrap();
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(bump_secs))
            .unwrap();
    }

    #[test]
    fn test_open_creates_missing_file() {
        let path = std::env::temp_dir()
            .join(format!("gate-{}", uuid::Uuid::new_v4()))
            .join("blacklist.txt");
        let store = BlacklistStore::open(&path).unwrap();

        assert!(path.exists());
        assert!(!store.is_blacklisted("10.0.0.1").unwrap());
        assert!(store.is_empty().unwrap());

        fs::remove_dir_all(path.parent().unwrap()).unwrap_or_default();
    }

    #[test]
    fn test_add_appends_once() {
        let path = temp_path();
        let store = BlacklistStore::open(&path).unwrap();

        assert!(store.add("10.0.0.1").unwrap());
        assert!(!store.add("10.0.0.1").unwrap());
        assert!(store.add("10.0.0.2").unwrap());

        assert!(store.is_blacklisted("10.0.0.1").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "10.0.0.1\n10.0.0.2\n");

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_concurrent_adds_write_once() {
        let path = temp_path();
        let store = BlacklistStore::open(&path).unwrap();

        let newly_added = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(|| store.add("1.2.3.4").unwrap()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|added| *added)
                .count()
        });

        assert_eq!(newly_added, 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "1.2.3.4\n");

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_entries_survive_reopen() {
        let path = temp_path();
        BlacklistStore::open(&path).unwrap().add("192.0.2.9").unwrap();

        let reopened = BlacklistStore::open(&path).unwrap();
        assert!(reopened.is_blacklisted("192.0.2.9").unwrap());

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_hand_edits_are_picked_up() {
        let path = temp_path();
        let store = BlacklistStore::open(&path).unwrap();
        assert!(!store.is_blacklisted("198.51.100.4").unwrap());

        hand_edit(&path, b"198.51.100.4\n", 5);
        assert!(store.is_blacklisted("198.51.100.4").unwrap());

        hand_edit(&path, b"203.0.113.1\n", 10);
        assert!(!store.is_blacklisted("198.51.100.4").unwrap());
        assert!(store.is_blacklisted("203.0.113.1").unwrap());

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_deleted_file_is_recreated_empty() {
        let path = temp_path();
        let store = BlacklistStore::open(&path).unwrap();
        store.add("10.1.1.1").unwrap();

        fs::remove_file(&path).unwrap();
        assert!(!store.is_blacklisted("10.1.1.1").unwrap());
        assert!(path.exists());

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_parse_tolerates_garbage() {
        let entries = parse_entries(b"  10.0.0.1  \r\n\n10.0.\xff0.2\n\t\n::1\n");
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort();
        assert_eq!(entries, vec!["10.0.0.1", "10.0.0.2", "::1"]);
    }
}
