//! Two-tier image cache for remote images.
//!
//! Fetching a remote thumbnail is slow and decoding it is not free, so
//! displayed images go through an [`ImageCache`]: a bounded in-memory tier
//! of decoded bitmaps in front of a directory of encoded files.
//!
//! # Design
//!
//! ## Memory tier
//!
//! An LRU map from logical key (usually the image URL) to decoded
//! [`Bitmap`], bounded by an entry count **and** a total cost, where cost is
//! the decoded footprint (`width × height × 4` bytes). Inserting past either
//! ceiling evicts least-recently-used entries until both hold again. An
//! entry whose cost alone exceeds the cost ceiling is written to disk but
//! never kept in memory. Every `get`/`put` takes one lock, so each appears
//! atomic to other callers.
//!
//! ## Disk tier
//!
//! The disk tier is **content-addressed by key**: each entry is one file
//! named by the SHA-256 hex digest of its key, holding the bitmap re-encoded
//! as JPEG. There is no index file; existence is the whole lookup.
//!
//! - Files are written by a background job after `put` has returned. A
//!   failed write is logged and dropped; the next miss simply re-fetches.
//! - Writes go to a temp file that is renamed into place, so readers never
//!   see partial bytes.
//! - Every `put` takes a write ticket for its key. A finished write is
//!   renamed into place only while its ticket is still the latest for that
//!   key; `remove`, `clear` and a newer `put` retire older tickets. The
//!   check and the rename happen under one lock, so a stale write never
//!   resurrects a removed entry or overwrites a newer one.
//! - Nothing is ever re-validated. A disk entry is the terminal cached copy
//!   of its key until [`ImageCache::clear`] or [`ImageCache::remove`].
//!
//! ## Read-through
//!
//! [`ImageCache::get_or_fetch`] is the display path for remote images: look
//! up the key, and on a miss run the caller's fetch, decode the bytes and
//! `put` the result.
//!
//! ## Failure policy
//!
//! The cache has no error type. Unreadable or undecodable disk entries are a
//! miss, and write failures are a no-op: showing an image must never fail
//! because of its cache.

use crate::imaging::{Bitmap, ImageBackend, Quality, RustBackend, estimate_decoded_cost};
use lru::LruCache;
use parking_lot::{Condvar, Mutex};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Default entry-count ceiling of the memory tier.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Default cost ceiling of the memory tier (50 MiB).
pub const DEFAULT_MAX_COST_BYTES: usize = 50 * 1024 * 1024;

/// Suffix of in-flight disk writes. Such files are never read back.
const TEMP_SUFFIX: &str = ".tmp";

/// Platform cache location used when no directory is configured.
pub fn default_directory() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("cropkeep").join("ImageCache"))
}

/// SHA-256 hex digest of a logical key: the disk-tier file name.
pub fn hash_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

/// Bounds and encoding for an [`ImageCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    pub max_entries: usize,
    pub max_cost_bytes: usize,
    /// Quality of the JPEG written to the disk tier.
    pub quality: Quality,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_cost_bytes: DEFAULT_MAX_COST_BYTES,
            quality: Quality::default(),
        }
    }
}

/// Process-wide image cache. Share it behind an `Arc`.
pub struct ImageCache {
    dir: PathBuf,
    quality: Quality,
    backend: Arc<dyn ImageBackend>,
    memory: Mutex<MemoryTier>,
    pending: Arc<PendingWrites>,
    tickets: Arc<Mutex<WriteTickets>>,
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
}

impl ImageCache {
    /// Open (creating if needed) a cache rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, limits: CacheLimits) -> io::Result<Self> {
        Self::with_backend(dir, limits, Arc::new(RustBackend::new()))
    }

    /// Open a cache that encodes and decodes disk entries with `backend`.
    pub fn with_backend(
        dir: impl Into<PathBuf>,
        limits: CacheLimits,
        backend: Arc<dyn ImageBackend>,
    ) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), ?limits, "image cache opened");
        Ok(Self {
            dir,
            quality: limits.quality,
            backend,
            memory: Mutex::new(MemoryTier::new(limits.max_entries, limits.max_cost_bytes)),
            pending: Arc::new(PendingWrites::default()),
            tickets: Arc::new(Mutex::new(WriteTickets::default())),
            memory_hits: AtomicU64::new(0),
            disk_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Disk-tier path for a logical key.
    pub fn disk_path(&self, key: &str) -> PathBuf {
        self.dir.join(hash_key(key))
    }

    /// Look up `key`: memory first, then disk.
    ///
    /// A disk hit is decoded and promoted into the memory tier. Any failure
    /// along the way is a miss.
    pub fn get(&self, key: &str) -> Option<Bitmap> {
        let cached = self.memory.lock().get(key);
        if let Some(bitmap) = cached {
            self.memory_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key, "image cache memory hit");
            return Some(bitmap);
        }

        let path = self.disk_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!(key, error = %e, "image cache disk read failed");
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match self.backend.decode(&bytes) {
            Ok(bitmap) => {
                self.memory.lock().insert(key.to_string(), bitmap.clone());
                self.disk_hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "image cache disk hit");
                Some(bitmap)
            }
            Err(e) => {
                debug!(key, error = %e, "discarding undecodable disk entry");
                fs::remove_file(&path).ok();
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `bitmap` under `key`.
    ///
    /// The memory tier is updated before this returns; the disk write runs
    /// later on the rayon pool and its outcome is never reported.
    pub fn put(&self, key: &str, bitmap: Bitmap) {
        let evicted = self.memory.lock().insert(key.to_string(), bitmap.clone());
        if evicted > 0 {
            debug!(key, evicted, "image cache evicted entries");
        }

        let write = DiskWrite {
            key: key.to_string(),
            ticket: self.tickets.lock().issue(key),
            path: self.disk_path(key),
        };
        let backend = Arc::clone(&self.backend);
        let tickets = Arc::clone(&self.tickets);
        let pending = Arc::clone(&self.pending);
        let quality = self.quality;
        pending.begin();
        rayon::spawn(move || {
            match write_disk_entry(backend.as_ref(), &tickets, &write, &bitmap, quality) {
                Ok(true) => {}
                Ok(false) => debug!(key = %write.key, "superseded disk write discarded"),
                Err(e) => {
                    tickets.lock().redeem(&write.key, write.ticket);
                    warn!(path = %write.path.display(), error = %e, "image cache disk write dropped");
                }
            }
            pending.finish();
        });
    }

    /// Look up `key`, fetching and caching it on a miss.
    ///
    /// `fetch` runs only when both tiers miss. Its bytes are decoded with the
    /// cache's backend off the async runtime and stored with [`put`](Self::put).
    /// A failed fetch or undecodable bytes yield `None` and store nothing.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Option<Bitmap>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, E>>,
        E: fmt::Display,
    {
        if let Some(bitmap) = self.get(key) {
            return Some(bitmap);
        }

        let bytes = match fetch().await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(key, error = %e, "image fetch failed");
                return None;
            }
        };

        let backend = Arc::clone(&self.backend);
        match tokio::task::spawn_blocking(move || backend.decode(&bytes)).await {
            Ok(Ok(bitmap)) => {
                self.put(key, bitmap.clone());
                Some(bitmap)
            }
            Ok(Err(e)) => {
                debug!(key, error = %e, "fetched bytes are not an image");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "image decode worker failed");
                None
            }
        }
    }

    /// Drop `key` from both tiers so the next `get` misses.
    ///
    /// Writes still pending for `key` are discarded when they finish.
    pub fn remove(&self, key: &str) {
        self.memory.lock().remove(key);
        // Held across the deletion so no pending write lands in between.
        let mut tickets = self.tickets.lock();
        tickets.retire(key);
        match fs::remove_file(self.disk_path(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(key, error = %e, "failed to remove disk entry"),
        }
    }

    /// Empty the memory tier, then remove and recreate the disk directory.
    ///
    /// Writes scheduled before the call are discarded when they finish.
    pub fn clear(&self) {
        self.memory.lock().clear();
        let mut tickets = self.tickets.lock();
        tickets.retire_all();
        if let Err(e) = fs::remove_dir_all(&self.dir)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(dir = %self.dir.display(), error = %e, "failed to remove cache directory");
        }
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "failed to recreate cache directory");
        }
        info!(dir = %self.dir.display(), "image cache cleared");
    }

    /// Block until every scheduled disk write has finished.
    pub fn flush(&self) {
        self.pending.wait();
    }

    /// True when `key` is resident in memory. Does not touch recency.
    pub fn in_memory(&self, key: &str) -> bool {
        self.memory.lock().contains(key)
    }

    pub fn stats(&self) -> CacheStats {
        let memory = self.memory.lock();
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: memory.len(),
            cost_bytes: memory.cost(),
        }
    }

    /// Count and total size of the files in the disk tier.
    pub fn disk_usage(&self) -> DiskUsage {
        WalkDir::new(&self.dir)
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| !e.file_name().to_string_lossy().ends_with(TEMP_SUFFIX))
            .fold(DiskUsage::default(), |usage, entry| DiskUsage {
                files: usage.files + 1,
                bytes: usage.bytes + entry.metadata().map(|m| m.len()).unwrap_or(0),
            })
    }
}

impl fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageCache")
            .field("dir", &self.dir)
            .field("quality", &self.quality)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Memory tier
// ============================================================================

struct MemoryEntry {
    bitmap: Bitmap,
    cost: usize,
}

/// LRU bounded by entry count and total cost.
struct MemoryTier {
    entries: LruCache<String, MemoryEntry>,
    cost: usize,
    max_entries: usize,
    max_cost: usize,
}

impl MemoryTier {
    fn new(max_entries: usize, max_cost: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            cost: 0,
            max_entries,
            max_cost,
        }
    }

    fn get(&mut self, key: &str) -> Option<Bitmap> {
        self.entries.get(key).map(|entry| entry.bitmap.clone())
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Insert as most recent and evict until both ceilings hold.
    ///
    /// Returns the number of entries evicted.
    fn insert(&mut self, key: String, bitmap: Bitmap) -> usize {
        self.remove(&key);
        let cost = estimate_decoded_cost(bitmap.upright_dimensions());
        if cost > self.max_cost || self.max_entries == 0 {
            return 0;
        }
        self.entries.push(key, MemoryEntry { bitmap, cost });
        self.cost += cost;

        let mut evicted = 0;
        while self.entries.len() > self.max_entries || self.cost > self.max_cost {
            let Some((_, entry)) = self.entries.pop_lru() else {
                break;
            };
            self.cost -= entry.cost;
            evicted += 1;
        }
        evicted
    }

    fn remove(&mut self, key: &str) {
        if let Some(old) = self.entries.pop(key) {
            self.cost -= old.cost;
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.cost = 0;
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn cost(&self) -> usize {
        self.cost
    }
}

// ============================================================================
// Disk tier
// ============================================================================

#[derive(Debug, thiserror::Error)]
enum DiskWriteError {
    #[error(transparent)]
    Codec(#[from] crate::imaging::CodecError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Latest scheduled write per key.
///
/// Only the holder of the latest ticket may rename its file into place;
/// a key without an entry has no write allowed to land.
#[derive(Default)]
struct WriteTickets {
    next: u64,
    latest: HashMap<String, u64>,
}

impl WriteTickets {
    fn issue(&mut self, key: &str) -> u64 {
        self.next += 1;
        self.latest.insert(key.to_string(), self.next);
        self.next
    }

    /// Consume `ticket` if it is still the latest for `key`.
    fn redeem(&mut self, key: &str, ticket: u64) -> bool {
        if self.latest.get(key) == Some(&ticket) {
            self.latest.remove(key);
            true
        } else {
            false
        }
    }

    fn retire(&mut self, key: &str) {
        self.latest.remove(key);
    }

    fn retire_all(&mut self) {
        self.latest.clear();
    }
}

/// One scheduled disk write.
struct DiskWrite {
    key: String,
    ticket: u64,
    path: PathBuf,
}

/// Distinguishes temp files of concurrent writes to the same key.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Encode and stage `bitmap`, then rename it into place if `write` still
/// holds the latest ticket. Returns whether the entry landed.
fn write_disk_entry(
    backend: &dyn ImageBackend,
    tickets: &Mutex<WriteTickets>,
    write: &DiskWrite,
    bitmap: &Bitmap,
    quality: Quality,
) -> Result<bool, DiskWriteError> {
    let bytes = backend.encode(bitmap, quality)?;
    let dir = write
        .path
        .parent()
        .ok_or_else(|| io::Error::other("cache path has no parent directory"))?;
    // The directory may have been removed by a concurrent clear().
    fs::create_dir_all(dir)?;

    let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut tmp = write.path.as_os_str().to_owned();
    tmp.push(format!(".{}.{seq}{TEMP_SUFFIX}", std::process::id()));
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, &bytes)?;

    let mut tickets = tickets.lock();
    if !tickets.redeem(&write.key, write.ticket) {
        fs::remove_file(&tmp).ok();
        return Ok(false);
    }
    if let Err(e) = fs::rename(&tmp, &write.path) {
        fs::remove_file(&tmp).ok();
        return Err(e.into());
    }
    Ok(true)
}

/// Counter of scheduled-but-unfinished disk writes.
#[derive(Default)]
struct PendingWrites {
    count: Mutex<usize>,
    idle: Condvar,
}

impl PendingWrites {
    fn begin(&self) {
        *self.count.lock() += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}

// ============================================================================
// Reporting
// ============================================================================

/// Counters since the cache was opened, plus current memory residency.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub cost_bytes: usize,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.memory_hits + self.disk_hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} memory hits, {} disk hits, {} misses ({} lookups); {} entries resident ({} bytes)",
            self.memory_hits,
            self.disk_hits,
            self.misses,
            self.lookups(),
            self.entries,
            self.cost_bytes
        )
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub files: usize,
    pub bytes: u64,
}
