// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Descriptor cache: open log files keyed by their spool-relative path.
//!
//! An open-addressing table of fixed size. A path hashes to the sum of its
//! bytes modulo the table size; collisions probe linearly with wrap-around.
//! Evicted slots become tombstones so probe chains stay intact.
//!
//! When every slot is occupied the oldest entries (by last access) are
//! closed to make room. Rollover cleanup goes through
//! [`FdCache::close_all`] instead, which evicts by age regardless of fill.
//!
//! The cache remembers the bucket and slot of the last hit. A lookup that
//! starts from the same bucket checks that slot before scanning.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Component, Path, PathBuf};

use hl_core::{Clock, SystemClock};
use thiserror::Error;
use tracing::{debug, warn};

/// Percentage of entries closed when the table is full.
pub const DEFAULT_GC_PERCENT: u8 = 20;

/// Mode of newly created log files.
const FILE_MODE: u32 = 0o644;

/// Descriptor cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("descriptor cache has zero capacity")]
    ZeroCapacity,

    #[error("refusing log path outside the spool: {0}")]
    InvalidPath(String),

    #[error("too many open files while opening {path}: {source}")]
    TooManyOpenFiles { path: PathBuf, source: io::Error },

    #[error("cannot create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("cannot open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Lookup counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the table, shortcut included.
    pub hits: u64,
    /// Hits answered by the remembered slot without scanning.
    pub shortcut_hits: u64,
    /// Lookups that had to open a file.
    pub misses: u64,
    /// Entries closed by garbage collection, age eviction or `close`.
    pub evictions: u64,
}

#[derive(Debug)]
struct CachedFile {
    file: File,
    path: String,
    last_access: i64,
    /// Access sequence number, orders entries touched in the same second.
    tick: u64,
}

#[derive(Debug)]
enum Slot {
    Empty,
    Tombstone,
    Occupied(CachedFile),
}

impl Slot {
    fn holds(&self, path: &str) -> bool {
        matches!(self, Slot::Occupied(cached) if cached.path == path)
    }
}

/// Bounded cache of open, append-mode log files.
#[derive(Debug)]
pub struct FdCache<C: Clock = SystemClock> {
    root: PathBuf,
    slots: Vec<Slot>,
    occupied: usize,
    gc_percent: u8,
    clock: C,
    tick: u64,
    /// Bucket and slot of the previous hit.
    last: Option<(usize, usize)>,
    stats: CacheStats,
}

impl<C: Clock> FdCache<C> {
    /// Cache of `capacity` slots for files under `root`.
    pub fn new(root: impl Into<PathBuf>, capacity: usize, clock: C) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        let mut slots = Vec::new();
        slots.resize_with(capacity, || Slot::Empty);
        Ok(Self {
            root: root.into(),
            slots,
            occupied: 0,
            gc_percent: DEFAULT_GC_PERCENT,
            clock,
            tick: 0,
            last: None,
            stats: CacheStats::default(),
        })
    }

    pub fn with_gc_percent(mut self, percent: u8) -> Self {
        self.gc_percent = percent.clamp(1, 100);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.occupied
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    pub fn is_full(&self) -> bool {
        self.occupied == self.slots.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Home bucket of `path`.
    pub fn bucket(&self, path: &str) -> usize {
        bucket_of(path, self.slots.len())
    }

    /// Slot currently holding `path`, without touching it.
    pub fn slot_of(&self, path: &str) -> Option<usize> {
        self.find(path, self.bucket(path))
    }

    /// Open file for `path`, opening it if it is not cached.
    pub fn get(&mut self, path: &str) -> Result<&mut File, CacheError> {
        let index = self.open(path)?;
        match &mut self.slots[index] {
            Slot::Occupied(cached) => Ok(&mut cached.file),
            _ => Err(CacheError::InvalidPath(path.to_string())),
        }
    }

    /// Append `line` and a newline to `path` with a single write.
    pub fn append_line(&mut self, path: &str, line: &str) -> Result<(), CacheError> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        let file = self.get(path)?;
        file.write_all(&buf).map_err(|source| CacheError::Write {
            path: PathBuf::from(path),
            source,
        })
    }

    /// Slot index of `path`, opening the file on a miss.
    pub fn open(&mut self, path: &str) -> Result<usize, CacheError> {
        let bucket = self.bucket(path);

        if let Some((last_bucket, last_slot)) = self.last {
            if last_bucket == bucket && self.slots[last_slot].holds(path) {
                self.stats.hits += 1;
                self.stats.shortcut_hits += 1;
                self.touch(last_slot);
                return Ok(last_slot);
            }
        }

        if let Some(index) = self.find(path, bucket) {
            self.stats.hits += 1;
            self.touch(index);
            self.last = Some((bucket, index));
            return Ok(index);
        }

        self.stats.misses += 1;
        let index = match self.free_slot(bucket) {
            Some(index) => index,
            None => {
                self.garbage_collect(self.gc_percent);
                self.free_slot(bucket).ok_or(CacheError::ZeroCapacity)?
            }
        };

        let file = self.open_file(path)?;
        self.tick += 1;
        self.slots[index] = Slot::Occupied(CachedFile {
            file,
            path: path.to_string(),
            last_access: self.clock.epoch_secs(),
            tick: self.tick,
        });
        self.occupied += 1;
        self.last = Some((bucket, index));
        Ok(index)
    }

    /// Close the entry in slot `index`. Returns whether one was there.
    pub fn close(&mut self, index: usize) -> bool {
        if !matches!(self.slots.get(index), Some(Slot::Occupied(_))) {
            return false;
        }
        self.vacate(index);
        self.stats.evictions += 1;
        true
    }

    /// Close every entry last used before `older_than`, syncing data first
    /// when `sync` is set. Returns how many were closed.
    pub fn close_all(&mut self, older_than: i64, sync: bool) -> usize {
        let stale: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied(cached) if cached.last_access < older_than => Some(index),
                _ => None,
            })
            .collect();

        for &index in &stale {
            if sync {
                if let Slot::Occupied(cached) = &self.slots[index] {
                    if let Err(e) = cached.file.sync_data() {
                        warn!(path = %cached.path, error = %e, "sync before close failed");
                    }
                }
            }
            self.vacate(index);
        }
        self.stats.evictions += stale.len() as u64;
        if !stale.is_empty() {
            debug!(closed = stale.len(), older_than, "closed stale descriptors");
        }
        stale.len()
    }

    /// Close the least recently used `percent` of entries (rounded up, at
    /// least one when non-empty). Returns how many were closed.
    pub fn garbage_collect(&mut self, percent: u8) -> usize {
        if self.occupied == 0 {
            return 0;
        }
        let percent = usize::from(percent.min(100));
        let count = (self.occupied * percent).div_ceil(100).max(1);

        let mut by_age: Vec<(i64, u64, usize)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied(cached) => Some((cached.last_access, cached.tick, index)),
                _ => None,
            })
            .collect();
        by_age.sort_unstable();

        for &(_, _, index) in by_age.iter().take(count) {
            self.vacate(index);
        }
        self.stats.evictions += count as u64;
        debug!(
            closed = count,
            remaining = self.occupied,
            "descriptor cache garbage collected"
        );
        count
    }

    fn touch(&mut self, index: usize) {
        self.tick += 1;
        let now = self.clock.epoch_secs();
        if let Slot::Occupied(cached) = &mut self.slots[index] {
            cached.last_access = now;
            cached.tick = self.tick;
        }
    }

    fn find(&self, path: &str, bucket: usize) -> Option<usize> {
        let n = self.slots.len();
        for step in 0..n {
            let index = (bucket + step) % n;
            match &self.slots[index] {
                Slot::Empty => return None,
                slot if slot.holds(path) => return Some(index),
                _ => {}
            }
        }
        None
    }

    fn free_slot(&self, bucket: usize) -> Option<usize> {
        let n = self.slots.len();
        (0..n)
            .map(|step| (bucket + step) % n)
            .find(|&index| !matches!(self.slots[index], Slot::Occupied(_)))
    }

    /// Drop the entry in `index` (closing its file) and keep probe chains
    /// short: a vacancy followed by an empty slot can itself become empty,
    /// and so can the tombstones leading up to it.
    fn vacate(&mut self, index: usize) {
        let n = self.slots.len();
        if matches!(self.slots[index], Slot::Occupied(_)) {
            self.occupied -= 1;
        }
        if self.last.is_some_and(|(_, slot)| slot == index) {
            self.last = None;
        }

        if !matches!(self.slots[(index + 1) % n], Slot::Empty) {
            self.slots[index] = Slot::Tombstone;
            return;
        }
        self.slots[index] = Slot::Empty;
        let mut prev = (index + n - 1) % n;
        for _ in 1..n {
            if !matches!(self.slots[prev], Slot::Tombstone) {
                break;
            }
            self.slots[prev] = Slot::Empty;
            prev = (prev + n - 1) % n;
        }
    }

    fn open_file(&self, path: &str) -> Result<File, CacheError> {
        let relative = Path::new(path);
        if path.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(CacheError::InvalidPath(path.to_string()));
        }
        let full = self.root.join(relative);

        match open_append(&full) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if let Some(parent) = full.parent() {
                    fs::create_dir_all(parent).map_err(|source| CacheError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                    debug!(path = %parent.display(), "created log directory");
                }
                open_append(&full).map_err(|source| open_error(full, source))
            }
            Err(e) => Err(open_error(full, e)),
        }
    }
}

fn bucket_of(path: &str, n: usize) -> usize {
    let sum = path
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_add(usize::from(b)));
    sum % n
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .mode(FILE_MODE)
        .open(path)
}

fn open_error(path: PathBuf, source: io::Error) -> CacheError {
    match source.raw_os_error() {
        Some(libc::EMFILE | libc::ENFILE) => CacheError::TooManyOpenFiles { path, source },
        _ => CacheError::Open { path, source },
    }
}

#[cfg(test)]
#[path = "fd_cache_tests.rs"]
mod tests;
