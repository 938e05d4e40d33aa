//! Storage Engine with Write-Behind Persistence
//!
//! This module composes the two storage halves into the engine the command
//! layer talks to:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       StorageEngine                          │
//! │                                                              │
//! │  put ──> LruCache ──> pending map ──> channel ─┐             │
//! │  get ──> LruCache ──> pending map ──> DiskLog  │             │
//! │                                                ▼             │
//! │                                     write-behind worker      │
//! │                                     (dedicated thread)       │
//! │                                                │             │
//! │                                                ▼             │
//! │                                  DiskLog (data.dat/index.dat)│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A SET is acknowledged once the cache and the pending map hold the value;
//! the append to disk happens asynchronously on the worker thread. That keeps
//! network latency insensitive to disk cost, at the price of a bounded
//! window in which an ungraceful kill loses acknowledged writes. Graceful
//! shutdown closes the channel, and the worker drains everything left before
//! exiting.
//!
//! ## The pending map
//!
//! Every acknowledged-but-unsettled key is mirrored in a map entry holding
//! the newest sequence number, the newest value (or a tombstone once the
//! key is deleted) and an in-flight flag. The worker *claims* a job under
//! the lock by raising the flag, runs the actual append with the lock
//! *released*, then reacquires it briefly to *settle*: if the entry still
//! names the appended sequence the write is durable and the entry goes
//! away; if the entry became a tombstone in the meantime, the worker
//! erases the index entry it just wrote before dropping the tombstone.
//! DEL and FLUSH unlink idle entries outright (the skipped job later fails
//! its claim) and downgrade in-flight ones to tombstones; a newer SET
//! overwrites value and sequence but preserves the in-flight flag, so the
//! eventual settle still knows an older append ran. A slow worker can
//! therefore never resurrect a deleted key, and no caller ever waits on
//! disk I/O just to touch the map — the lock only guards map updates. The
//! map doubles as a read path: a key evicted from the cache before its
//! write landed is still served from memory.

use bytes::Bytes;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::storage::cache::LruCache;
use crate::storage::disk::{DiskError, DiskLog, IndexEntry};
use crate::storage::{MAX_KEY_LEN, MAX_VALUE_LEN};

/// Default number of entries the cache will hold.
pub const DEFAULT_CACHE_CAPACITY: usize = 1_000_000;

/// Default directory for `data.dat` and `index.dat`.
pub const DEFAULT_STORAGE_DIR: &str = "disk_storage";

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("empty key")]
    EmptyKey,

    #[error("key too large: {0} bytes (max: {MAX_KEY_LEN})")]
    KeyTooLarge(usize),

    #[error("value too large: {0} bytes (max: {MAX_VALUE_LEN})")]
    ValueTooLarge(usize),

    /// The engine has been shut down and no longer accepts work.
    #[error("storage engine is shut down")]
    Shutdown,

    #[error(transparent)]
    Disk(#[from] DiskError),
}

/// Construction-time parameters. Capacity is invariant for the engine's
/// lifetime.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding the log and index files.
    pub dir: PathBuf,
    /// Maximum number of entries held in memory.
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Per-key state of a write acknowledged to a client but not yet settled
/// on disk.
#[derive(Debug)]
struct PendingWrite {
    /// Sequence of the newest acknowledged write to this key.
    seq: u64,
    /// Newest in-memory value. `None` is a tombstone: the key was deleted
    /// (or flushed) while an append was in flight, and the worker erases
    /// the freshly written index entry when it settles.
    value: Option<Bytes>,
    /// The worker is appending this key right now, with the map unlocked.
    /// Newer writes preserve the flag; only the worker's settle clears it.
    in_flight: bool,
}

/// Work items for the write-behind worker. Shutdown is signalled by closing
/// the channel, not by a message.
enum WriteJob {
    Put { key: Bytes, seq: u64, value: Bytes },
    /// FIFO barrier: everything enqueued before it is durable once the ack
    /// fires.
    Sync(std_mpsc::Sender<()>),
}

/// The unified storage engine: LRU cache over an append-only log, writes
/// deferred to a background worker.
///
/// Designed to be wrapped in an `Arc` and shared between the connection
/// tasks and the worker; every operation takes `&self`.
pub struct StorageEngine {
    cache: Mutex<LruCache>,
    disk: Arc<DiskLog>,
    pending: Arc<Mutex<HashMap<Bytes, PendingWrite>>>,
    next_seq: AtomicU64,
    tx: Mutex<Option<UnboundedSender<WriteJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("cache_len", &self.cache.lock().unwrap().len())
            .field("index_len", &self.disk.index_len())
            .finish()
    }
}

impl StorageEngine {
    /// Opens the engine: loads the persisted index, warms the cache with the
    /// most recent records (index order, up to capacity) and starts the
    /// write-behind worker.
    pub fn open(config: EngineConfig) -> Result<Self, EngineError> {
        let disk = Arc::new(DiskLog::open(&config.dir)?);

        let mut cache = LruCache::new(config.cache_capacity);
        let mut warmed = 0usize;
        for key in disk.keys() {
            if warmed >= config.cache_capacity {
                break;
            }
            match disk.read(&key) {
                Ok(Some(value)) => {
                    cache.put(key, value);
                    warmed += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "skipping unreadable record during cache warm-up");
                }
            }
        }
        if warmed > 0 {
            info!(entries = warmed, "cache warmed from disk index");
        }

        let pending: Arc<Mutex<HashMap<Bytes, PendingWrite>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = {
            let disk = Arc::clone(&disk);
            let pending = Arc::clone(&pending);
            thread::Builder::new()
                .name("emberkv-writer".to_string())
                .spawn(move || write_behind_loop(rx, disk, pending))
                .map_err(DiskError::Io)?
        };

        Ok(Self {
            cache: Mutex::new(cache),
            disk,
            pending,
            next_seq: AtomicU64::new(1),
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stores `key` -> `value`.
    ///
    /// The value is visible to every subsequent `get` as soon as this
    /// returns; durability follows asynchronously (or via [`sync`]).
    ///
    /// [`sync`]: StorageEngine::sync
    pub fn put(&self, key: Bytes, value: Bytes) -> Result<(), EngineError> {
        validate(&key, &value)?;

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.cache.lock().unwrap().put(key.clone(), value.clone());

        // The pending entry must be in place before the job is on the
        // channel: the worker only claims a job while the sequences match.
        // An existing entry keeps its in-flight flag, so an older append
        // still running settles correctly against this newer write.
        {
            let mut pending = self.pending.lock().unwrap();
            let entry = pending.entry(key.clone()).or_insert(PendingWrite {
                seq,
                value: None,
                in_flight: false,
            });
            entry.seq = seq;
            entry.value = Some(value.clone());
        }

        self.send(WriteJob::Put { key, seq, value })
    }

    /// Looks up `key`: cache first, then the pending map, then the log.
    ///
    /// A disk hit repopulates the cache (possibly evicting the least-recent
    /// entry). Corrupt records are logged and reported as absent.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        if let Some(value) = self.cache.lock().unwrap().get(key) {
            return Some(value);
        }

        // Acknowledged but not yet on disk; the cache may have evicted it.
        let pending_hit = {
            let pending = self.pending.lock().unwrap();
            pending.get(key).map(|entry| entry.value.clone())
        };
        match pending_hit {
            Some(Some(value)) => {
                self.cache
                    .lock()
                    .unwrap()
                    .put(Bytes::copy_from_slice(key), value.clone());
                return Some(value);
            }
            // Tombstone: deleted while its append settles. The index may
            // still hold the record, so do not fall through to disk.
            Some(None) => return None,
            None => {}
        }

        match self.disk.read(key) {
            Ok(Some(value)) => {
                self.cache
                    .lock()
                    .unwrap()
                    .put(Bytes::copy_from_slice(key), value.clone());
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "disk read failed, treating key as absent");
                None
            }
        }
    }

    /// Deletes `key` from cache, index and the pending queue.
    ///
    /// Returns true iff the key existed anywhere. An idle pending entry is
    /// unlinked here, before the worker can claim its job, so the job is
    /// later skipped; an entry whose append is already in flight is
    /// downgraded to a tombstone instead, and the worker erases the
    /// record's index entry right after that append lands. Either way the
    /// key stays dead, and the pending lock is never held across disk I/O.
    pub fn del(&self, key: &[u8]) -> Result<bool, EngineError> {
        let was_pending = {
            let mut pending = self.pending.lock().unwrap();
            // (tombstone?, in-flight?) of the current entry, if any.
            let state = pending
                .get(key)
                .map(|entry| (entry.value.is_none(), entry.in_flight));
            match state {
                // A previous DEL is still settling; the key is already
                // gone and the index entry, if any, is about to be.
                Some((true, _)) => return Ok(false),
                // An append is running right now; leave a tombstone the
                // worker settles by erasing whatever it just indexed.
                Some((false, true)) => {
                    if let Some(entry) = pending.get_mut(key) {
                        entry.value = None;
                    }
                    true
                }
                // Not claimed yet; unlink so the queued job fails its claim.
                Some((false, false)) => {
                    pending.remove(key);
                    true
                }
                None => false,
            }
        };

        let was_cached = self.cache.lock().unwrap().remove(key);
        let was_indexed = self.disk.remove(key)?;

        Ok(was_pending || was_cached || was_indexed)
    }

    /// Empties the store: cache, pending queue and both disk files.
    pub fn clear(&self) -> Result<(), EngineError> {
        {
            let mut pending = self.pending.lock().unwrap();
            // Idle entries are dropped outright; their jobs will fail the
            // claim and be skipped. An in-flight write becomes a tombstone
            // so the worker erases whatever it indexes after the truncate
            // below.
            pending.retain(|_, entry| entry.in_flight);
            for entry in pending.values_mut() {
                entry.value = None;
            }
        }

        self.disk.flush()?;
        self.cache.lock().unwrap().clear();

        debug!("store cleared");
        Ok(())
    }

    /// Blocks until every write enqueued before this call is durable.
    ///
    /// Not meant for the event-loop path; the server calls it during
    /// shutdown and tests call it before asserting on-disk state.
    pub fn sync(&self) -> Result<(), EngineError> {
        let (ack_tx, ack_rx) = std_mpsc::channel();
        self.send(WriteJob::Sync(ack_tx))?;
        ack_rx.recv().map_err(|_| EngineError::Shutdown)
    }

    /// Number of keys known to the engine: |cache ∪ index|.
    pub fn len(&self) -> usize {
        let cache = self.cache.lock().unwrap();
        self.disk.index_len() + self.disk.count_missing(cache.keys())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries currently cached in memory.
    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// Drains the pending queue and stops the worker. Idempotent; also runs
    /// on drop.
    pub fn shutdown(&self) {
        // Closing the channel is the shutdown signal; the worker finishes
        // whatever is queued first.
        let tx = self.tx.lock().unwrap().take();
        drop(tx);

        if let Some(handle) = self.worker.lock().unwrap().take() {
            if handle.join().is_err() {
                error!("write-behind worker panicked during shutdown");
            }
        }
    }

    fn send(&self, job: WriteJob) -> Result<(), EngineError> {
        let tx = self.tx.lock().unwrap();
        tx.as_ref()
            .ok_or(EngineError::Shutdown)?
            .send(job)
            .map_err(|_| EngineError::Shutdown)
    }
}

impl Drop for StorageEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn validate(key: &[u8], value: &[u8]) -> Result<(), EngineError> {
    if key.is_empty() {
        return Err(EngineError::EmptyKey);
    }
    if key.len() > MAX_KEY_LEN {
        return Err(EngineError::KeyTooLarge(key.len()));
    }
    if value.len() > MAX_VALUE_LEN {
        return Err(EngineError::ValueTooLarge(value.len()));
    }
    Ok(())
}

/// The write-behind worker: runs on its own thread until the channel closes,
/// then drains what is left and exits.
fn write_behind_loop(
    mut rx: UnboundedReceiver<WriteJob>,
    disk: Arc<DiskLog>,
    pending: Arc<Mutex<HashMap<Bytes, PendingWrite>>>,
) {
    while let Some(job) = rx.blocking_recv() {
        match job {
            WriteJob::Put { key, seq, value } => {
                // Claim the write under the lock, append with the lock
                // released, then settle. GET and DEL only ever contend on
                // the brief map updates, never on the append itself.
                let claimed = {
                    let mut guard = pending.lock().unwrap();
                    match guard.get_mut(&key) {
                        // Still the newest write for this key.
                        Some(entry) if entry.seq == seq && entry.value.is_some() => {
                            entry.in_flight = true;
                            true
                        }
                        // Superseded by a newer SET, or purged by DEL/FLUSH.
                        _ => false,
                    }
                };
                if !claimed {
                    continue;
                }

                let result = disk.append(&key, &value);
                settle_append(&disk, &pending, &key, seq, result);
            }
            WriteJob::Sync(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("write-behind worker drained and stopped");
}

/// Settles a claimed write after its append attempt, reacquiring the map
/// lock only for the update itself.
fn settle_append(
    disk: &Arc<DiskLog>,
    pending: &Arc<Mutex<HashMap<Bytes, PendingWrite>>>,
    key: &Bytes,
    seq: u64,
    result: Result<IndexEntry, DiskError>,
) {
    let mut guard = pending.lock().unwrap();
    let (is_tombstone, is_current) = match guard.get_mut(key) {
        Some(entry) => {
            entry.in_flight = false;
            (
                entry.value.is_none(),
                entry.value.is_some() && entry.seq == seq,
            )
        }
        // In-flight entries are tombstoned rather than removed, so the
        // entry should always be here; nothing to settle if it is not.
        None => return,
    };

    match result {
        Ok(_) => {
            if is_current {
                // The newest write for this key is durable; the entry can go.
                guard.remove(key);
            } else if is_tombstone {
                // DEL or FLUSH raced the append: erase the index entry just
                // written, keeping the tombstone visible until the index is
                // clean again, then drop it (unless a new write arrived).
                drop(guard);
                if let Err(e) = disk.remove(key) {
                    error!(error = %e, "failed to purge deleted key after append");
                }
                let mut guard = pending.lock().unwrap();
                if guard.get(key).map_or(false, |entry| entry.value.is_none()) {
                    guard.remove(key);
                }
            }
            // Otherwise a newer write replaced the entry; its own job will
            // overwrite the index entry this append left behind.
        }
        Err(e) => {
            error!(error = %e, "write-behind append failed");
            if is_tombstone {
                // Nothing landed, so there is nothing to purge either.
                guard.remove(key);
            }
            // If the entry still holds a value (ours or newer), keep it:
            // the value stays readable from memory.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    fn open_engine(dir: &TempDir, cache_capacity: usize) -> StorageEngine {
        StorageEngine::open(EngineConfig {
            dir: dir.path().to_path_buf(),
            cache_capacity,
        })
        .unwrap()
    }

    #[test]
    fn set_then_get() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir, 16);

        engine.put(b("foo"), b("bar")).unwrap();
        assert_eq!(engine.get(b"foo"), Some(b("bar")));
        assert_eq!(engine.get(b"missing"), None);
    }

    #[test]
    fn latest_put_wins() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir, 16);

        engine.put(b("k"), b("v1")).unwrap();
        engine.put(b("k"), b("v2")).unwrap();
        assert_eq!(engine.get(b"k"), Some(b("v2")));

        engine.sync().unwrap();
        drop(engine);

        let engine = open_engine(&dir, 16);
        assert_eq!(engine.get(b"k"), Some(b("v2")));
    }

    #[test]
    fn empty_value_round_trips() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir, 16);

        engine.put(b("k"), Bytes::new()).unwrap();
        assert_eq!(engine.get(b"k"), Some(Bytes::new()));
    }

    #[test]
    fn size_bounds_enforced() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir, 16);

        let key_max = Bytes::from(vec![b'k'; MAX_KEY_LEN]);
        let value_max = Bytes::from(vec![b'v'; MAX_VALUE_LEN]);
        engine.put(key_max.clone(), value_max.clone()).unwrap();
        assert_eq!(engine.get(&key_max), Some(value_max));

        assert!(matches!(
            engine.put(Bytes::new(), b("v")),
            Err(EngineError::EmptyKey)
        ));
        assert!(matches!(
            engine.put(Bytes::from(vec![b'k'; MAX_KEY_LEN + 1]), b("v")),
            Err(EngineError::KeyTooLarge(_))
        ));
        assert!(matches!(
            engine.put(b("k"), Bytes::from(vec![b'v'; MAX_VALUE_LEN + 1])),
            Err(EngineError::ValueTooLarge(_))
        ));
    }

    #[test]
    fn del_semantics() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir, 16);

        engine.put(b("foo"), b("bar")).unwrap();
        assert!(engine.del(b"foo").unwrap());
        assert!(!engine.del(b"foo").unwrap());
        assert_eq!(engine.get(b"foo"), None);
    }

    #[test]
    fn del_purges_pending_writes() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir, 16);

        // The DEL races the worker for the queued SET; whichever order they
        // run in, the key must stay dead.
        for i in 0..100 {
            let key = b(&format!("k{}", i));
            engine.put(key.clone(), b("v")).unwrap();
            assert!(engine.del(&key).unwrap());
        }
        engine.sync().unwrap();

        for i in 0..100 {
            assert_eq!(engine.get(format!("k{}", i).as_bytes()), None);
        }

        drop(engine);
        let engine = open_engine(&dir, 16);
        for i in 0..100 {
            assert_eq!(engine.get(format!("k{}", i).as_bytes()), None);
        }
    }

    #[test]
    fn eviction_falls_through_to_disk() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir, 2);

        engine.put(b("a"), b("1")).unwrap();
        engine.put(b("b"), b("2")).unwrap();
        engine.put(b("c"), b("3")).unwrap();
        engine.sync().unwrap();

        assert_eq!(engine.cache_len(), 2);
        // "a" was evicted but must still be readable from the log.
        assert_eq!(engine.get(b"a"), Some(b("1")));
        assert_eq!(engine.get(b"b"), Some(b("2")));
        assert_eq!(engine.get(b"c"), Some(b("3")));
    }

    #[test]
    fn evicted_before_append_is_still_readable() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir, 1);

        // With a single cache slot each put evicts the previous key, which
        // may not have reached the log yet; the pending map covers the gap.
        for i in 0..50 {
            engine.put(b(&format!("k{}", i)), b(&format!("v{}", i))).unwrap();
        }
        for i in 0..50 {
            assert_eq!(
                engine.get(format!("k{}", i).as_bytes()),
                Some(b(&format!("v{}", i))),
                "k{} must be readable before sync",
                i
            );
        }
    }

    #[test]
    fn sync_makes_writes_durable() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir, 16);

        engine.put(b("k1"), b("v1")).unwrap();
        engine.put(b("k2"), b("v2")).unwrap();
        engine.sync().unwrap();
        drop(engine);

        let engine = open_engine(&dir, 16);
        assert_eq!(engine.get(b"k1"), Some(b("v1")));
        assert_eq!(engine.get(b"k2"), Some(b("v2")));
    }

    #[test]
    fn shutdown_drains_the_queue() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir, 16);

        engine.put(b("k"), b("v")).unwrap();
        // No sync: the drop-path shutdown must drain the queue itself.
        drop(engine);

        let engine = open_engine(&dir, 16);
        assert_eq!(engine.get(b"k"), Some(b("v")));
    }

    #[test]
    fn operations_after_shutdown_fail() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir, 16);

        engine.shutdown();
        assert!(matches!(
            engine.put(b("k"), b("v")),
            Err(EngineError::Shutdown)
        ));
        assert!(matches!(engine.sync(), Err(EngineError::Shutdown)));
    }

    #[test]
    fn clear_empties_everything() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir, 16);

        engine.put(b("k1"), b("v1")).unwrap();
        engine.put(b("k2"), b("v2")).unwrap();
        engine.sync().unwrap();

        engine.clear().unwrap();
        assert_eq!(engine.get(b"k1"), None);
        assert_eq!(engine.len(), 0);
        drop(engine);

        let engine = open_engine(&dir, 16);
        assert_eq!(engine.get(b"k1"), None);
        assert_eq!(engine.get(b"k2"), None);
    }

    #[test]
    fn clear_purges_queued_and_inflight_writes() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir, 16);

        // The clear races the worker mid-queue; whatever was queued or
        // being appended at that moment must not survive it.
        for i in 0..100 {
            engine.put(b(&format!("k{}", i)), b("v")).unwrap();
        }
        engine.clear().unwrap();
        engine.sync().unwrap();

        for i in 0..100 {
            assert_eq!(engine.get(format!("k{}", i).as_bytes()), None);
        }
        assert_eq!(engine.len(), 0);

        drop(engine);
        let engine = open_engine(&dir, 16);
        assert_eq!(engine.len(), 0);
        for i in 0..100 {
            assert_eq!(engine.get(format!("k{}", i).as_bytes()), None);
        }
    }

    #[test]
    fn len_deduplicates_cache_and_index() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&dir, 16);

        engine.put(b("a"), b("1")).unwrap();
        engine.put(b("b"), b("2")).unwrap();
        engine.sync().unwrap();

        // Both keys are cached and indexed; each counts once.
        assert_eq!(engine.len(), 2);

        engine.del(b"a").unwrap();
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn reopen_warms_the_cache() {
        let dir = tempdir().unwrap();
        {
            let engine = open_engine(&dir, 16);
            engine.put(b("k1"), b("v1")).unwrap();
            engine.put(b("k2"), b("v2")).unwrap();
            engine.sync().unwrap();
        }

        let engine = open_engine(&dir, 16);
        assert_eq!(engine.cache_len(), 2);

        // Warm-up respects the capacity bound.
        drop(engine);
        let engine = open_engine(&dir, 1);
        assert_eq!(engine.cache_len(), 1);
        assert_eq!(engine.get(b"k1"), Some(b("v1")));
        assert_eq!(engine.get(b"k2"), Some(b("v2")));
    }
}
