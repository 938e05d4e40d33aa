//! Append-Only Disk Log and Persisted Index
//!
//! The durable half of the storage engine. Two files live under the storage
//! directory:
//!
//! - `data.dat` - the log. Records are appended, never rewritten:
//!   `u32 key_len | key | u32 value_len | value`, little-endian. A SET for an
//!   existing key orphans the old record; orphans are reclaimed only by a
//!   full flush.
//! - `index.dat` - the persisted index, mapping each live key to the offset
//!   and total size of its latest record:
//!   `u32 key_len | key | u64 offset | u64 size`, little-endian. It is
//!   rewritten in full after every mutation, via a temp file and rename so a
//!   crash mid-rewrite cannot leave a torn index.
//!
//! The in-memory index is an ordered map guarded by one mutex together with
//! the append handle. Reads open their own handle per call, so a GET served
//! from disk never contends with the write-behind worker's appends.
//!
//! Corruption policy: a short read, a length above the configured maxima, or
//! a stored key that does not match the requested one surfaces as
//! [`DiskError::Corrupt`]. Callers treat it as "key not present" and log a
//! warning; records are never auto-repaired.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::storage::{MAX_KEY_LEN, MAX_VALUE_LEN};

/// File name of the append-only log.
pub const DATA_FILE: &str = "data.dat";

/// File name of the persisted index.
pub const INDEX_FILE: &str = "index.dat";

const INDEX_TMP_FILE: &str = "index.dat.tmp";

/// Errors surfaced by the disk layer.
#[derive(Debug, thiserror::Error)]
pub enum DiskError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The on-disk bytes contradict the index or the configured limits.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Location of a key's latest record within the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Byte offset of the record's first byte in `data.dat`.
    pub offset: u64,
    /// Total record size in bytes, length prefixes included.
    pub size: u64,
}

struct Inner {
    index: BTreeMap<Bytes, IndexEntry>,
    /// Persistent append handle for `data.dat`.
    log: File,
    /// Offset at which the next record will land.
    tail: u64,
}

/// The append-only log plus its index.
pub struct DiskLog {
    data_path: PathBuf,
    index_path: PathBuf,
    index_tmp_path: PathBuf,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for DiskLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskLog")
            .field("data_path", &self.data_path)
            .field("index_len", &self.index_len())
            .finish()
    }
}

impl DiskLog {
    /// Opens (creating if necessary) the log under `dir` and loads the
    /// persisted index into memory.
    ///
    /// A truncated trailing index entry is logged and skipped rather than
    /// failing startup; everything before it is kept.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, DiskError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let data_path = dir.join(DATA_FILE);
        let index_path = dir.join(INDEX_FILE);
        let index_tmp_path = dir.join(INDEX_TMP_FILE);

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&data_path)?;
        let tail = log.metadata()?.len();

        let index = match File::open(&index_path) {
            Ok(file) => load_index(file)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            data_path,
            index_path,
            index_tmp_path,
            inner: Mutex::new(Inner { index, log, tail }),
        })
    }

    /// Appends one record and points the index at it.
    ///
    /// The record is assembled in memory and handed to the kernel in a
    /// single `write_all`, so concurrent readers never observe a half
    /// record below `tail`.
    pub fn append(&self, key: &[u8], value: &[u8]) -> Result<IndexEntry, DiskError> {
        let mut record = Vec::with_capacity(8 + key.len() + value.len());
        record.write_u32::<LittleEndian>(key.len() as u32)?;
        record.extend_from_slice(key);
        record.write_u32::<LittleEndian>(value.len() as u32)?;
        record.extend_from_slice(value);

        let mut inner = self.inner.lock().unwrap();
        let entry = IndexEntry {
            offset: inner.tail,
            size: record.len() as u64,
        };
        inner.log.write_all(&record)?;
        inner.log.flush()?;
        inner.tail += record.len() as u64;

        inner.index.insert(Bytes::copy_from_slice(key), entry);
        self.persist_index_locked(&inner)?;

        Ok(entry)
    }

    /// Reads the latest value for `key`, or `None` if the index has no entry.
    pub fn read(&self, key: &[u8]) -> Result<Option<Bytes>, DiskError> {
        let entry = {
            let inner = self.inner.lock().unwrap();
            match inner.index.get(key) {
                Some(entry) => *entry,
                None => return Ok(None),
            }
        };

        let mut file = File::open(&self.data_path)?;
        file.seek(SeekFrom::Start(entry.offset))?;

        let key_len = read_exact_u32(&mut file)? as usize;
        if key_len == 0 || key_len > MAX_KEY_LEN {
            return Err(DiskError::Corrupt(format!(
                "stored key length {} out of range",
                key_len
            )));
        }

        let mut stored_key = vec![0u8; key_len];
        file.read_exact(&mut stored_key).map_err(short_read)?;
        if stored_key != key {
            return Err(DiskError::Corrupt(
                "stored key does not match index entry".to_string(),
            ));
        }

        let value_len = read_exact_u32(&mut file)? as usize;
        if value_len > MAX_VALUE_LEN {
            return Err(DiskError::Corrupt(format!(
                "stored value length {} out of range",
                value_len
            )));
        }

        let mut value = vec![0u8; value_len];
        file.read_exact(&mut value).map_err(short_read)?;

        Ok(Some(Bytes::from(value)))
    }

    /// Erases `key` from the index and persists the rewrite.
    ///
    /// The log record itself stays behind as an orphan. Returns whether the
    /// key was indexed.
    pub fn remove(&self, key: &[u8]) -> Result<bool, DiskError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.index.remove(key).is_none() {
            return Ok(false);
        }
        self.persist_index_locked(&inner)?;
        Ok(true)
    }

    /// Truncates both files and clears the index. The only operation that
    /// reclaims log space.
    pub fn flush(&self) -> Result<(), DiskError> {
        let mut inner = self.inner.lock().unwrap();
        inner.log.set_len(0)?;
        inner.tail = 0;
        inner.index.clear();
        self.persist_index_locked(&inner)?;
        Ok(())
    }

    /// Returns true if `key` has an index entry.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.inner.lock().unwrap().index.contains_key(key)
    }

    /// Number of indexed keys.
    pub fn index_len(&self) -> usize {
        self.inner.lock().unwrap().index.len()
    }

    /// Snapshot of the indexed keys, in key order.
    pub fn keys(&self) -> Vec<Bytes> {
        self.inner.lock().unwrap().index.keys().cloned().collect()
    }

    /// Counts keys in `other` that are not indexed, under one index lock.
    pub fn count_missing<'a>(&self, other: impl Iterator<Item = &'a Bytes>) -> usize {
        let inner = self.inner.lock().unwrap();
        other.filter(|key| !inner.index.contains_key(key.as_ref())).count()
    }

    /// Rewrites `index.dat` from the in-memory map: temp file, flush, rename.
    fn persist_index_locked(&self, inner: &Inner) -> Result<(), DiskError> {
        let mut writer = BufWriter::new(File::create(&self.index_tmp_path)?);
        for (key, entry) in &inner.index {
            writer.write_u32::<LittleEndian>(key.len() as u32)?;
            writer.write_all(key)?;
            writer.write_u64::<LittleEndian>(entry.offset)?;
            writer.write_u64::<LittleEndian>(entry.size)?;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(&self.index_tmp_path, &self.index_path)?;
        Ok(())
    }
}

/// Reads `index.dat` sequentially into an ordered map.
fn load_index(file: File) -> Result<BTreeMap<Bytes, IndexEntry>, DiskError> {
    let mut reader = BufReader::new(file);
    let mut index = BTreeMap::new();

    loop {
        // A clean EOF before the next entry means we are done.
        let key_len = match reader.read_u32::<LittleEndian>() {
            Ok(len) => len as usize,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };

        if key_len == 0 || key_len > MAX_KEY_LEN {
            warn!(key_len, "index entry with out-of-range key length, stopping load");
            break;
        }

        let mut key = vec![0u8; key_len];
        let entry = (|| -> io::Result<IndexEntry> {
            reader.read_exact(&mut key)?;
            let offset = reader.read_u64::<LittleEndian>()?;
            let size = reader.read_u64::<LittleEndian>()?;
            Ok(IndexEntry { offset, size })
        })();

        match entry {
            Ok(entry) => {
                index.insert(Bytes::from(key), entry);
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                // Torn trailing entry, e.g. a crash before the rename
                // completed on a filesystem without atomic rename.
                warn!("truncated trailing index entry, stopping load");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(index)
}

fn read_exact_u32(file: &mut File) -> Result<u32, DiskError> {
    file.read_u32::<LittleEndian>().map_err(short_read)
}

/// Maps a short read to a corruption error; other I/O errors pass through.
fn short_read(e: io::Error) -> DiskError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        DiskError::Corrupt("record truncated".to_string())
    } else {
        DiskError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn append_then_read() {
        let dir = tempdir().unwrap();
        let log = DiskLog::open(dir.path()).unwrap();

        let entry = log.append(b"foo", b"bar").unwrap();
        assert_eq!(entry.offset, 0);
        assert_eq!(entry.size, 4 + 3 + 4 + 3);

        assert_eq!(log.read(b"foo").unwrap(), Some(b("bar")));
        assert_eq!(log.read(b"missing").unwrap(), None);
    }

    #[test]
    fn rewrite_points_index_at_latest_record() {
        let dir = tempdir().unwrap();
        let log = DiskLog::open(dir.path()).unwrap();

        let first = log.append(b"k", b"old").unwrap();
        let second = log.append(b"k", b"new").unwrap();
        assert_eq!(second.offset, first.size);

        assert_eq!(log.read(b"k").unwrap(), Some(b("new")));
        assert_eq!(log.index_len(), 1);
    }

    #[test]
    fn empty_value_round_trips() {
        let dir = tempdir().unwrap();
        let log = DiskLog::open(dir.path()).unwrap();

        log.append(b"k", b"").unwrap();
        assert_eq!(log.read(b"k").unwrap(), Some(Bytes::new()));
    }

    #[test]
    fn index_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let log = DiskLog::open(dir.path()).unwrap();
            log.append(b"k1", b"v1").unwrap();
            log.append(b"k2", b"v2").unwrap();
        }

        let log = DiskLog::open(dir.path()).unwrap();
        assert_eq!(log.index_len(), 2);
        assert_eq!(log.read(b"k1").unwrap(), Some(b("v1")));
        assert_eq!(log.read(b"k2").unwrap(), Some(b("v2")));

        // Appends land after the existing records.
        log.append(b"k3", b"v3").unwrap();
        assert_eq!(log.read(b"k1").unwrap(), Some(b("v1")));
        assert_eq!(log.read(b"k3").unwrap(), Some(b("v3")));
    }

    #[test]
    fn remove_is_durable() {
        let dir = tempdir().unwrap();
        {
            let log = DiskLog::open(dir.path()).unwrap();
            log.append(b"gone", b"v").unwrap();
            log.append(b"kept", b"v").unwrap();
            assert!(log.remove(b"gone").unwrap());
            assert!(!log.remove(b"gone").unwrap());
        }

        let log = DiskLog::open(dir.path()).unwrap();
        assert_eq!(log.read(b"gone").unwrap(), None);
        assert_eq!(log.read(b"kept").unwrap(), Some(b("v")));
    }

    #[test]
    fn flush_truncates_both_files() {
        let dir = tempdir().unwrap();
        let log = DiskLog::open(dir.path()).unwrap();
        log.append(b"k", b"v").unwrap();

        log.flush().unwrap();
        assert_eq!(log.index_len(), 0);
        assert_eq!(log.read(b"k").unwrap(), None);
        assert_eq!(fs::metadata(dir.path().join(DATA_FILE)).unwrap().len(), 0);
        assert_eq!(fs::metadata(dir.path().join(INDEX_FILE)).unwrap().len(), 0);

        // The log is writable again from offset zero.
        let entry = log.append(b"k2", b"v2").unwrap();
        assert_eq!(entry.offset, 0);
        assert_eq!(log.read(b"k2").unwrap(), Some(b("v2")));
    }

    #[test]
    fn truncated_record_reads_as_corrupt() {
        let dir = tempdir().unwrap();
        let log = DiskLog::open(dir.path()).unwrap();
        log.append(b"key", b"value").unwrap();

        // Chop the record's tail off behind the index's back.
        let data = dir.path().join(DATA_FILE);
        let file = OpenOptions::new().write(true).open(&data).unwrap();
        file.set_len(6).unwrap();

        assert!(matches!(log.read(b"key"), Err(DiskError::Corrupt(_))));
    }

    #[test]
    fn mismatched_key_reads_as_corrupt() {
        let dir = tempdir().unwrap();
        let log = DiskLog::open(dir.path()).unwrap();
        log.append(b"aa", b"1").unwrap();
        log.append(b"bb", b"2").unwrap();

        // Hand-craft an index that points "aa" at "bb"'s record.
        drop(log);
        let entry_of_bb = {
            let log = DiskLog::open(dir.path()).unwrap();
            let inner = log.inner.lock().unwrap();
            inner.index[&b("bb")]
        };
        let mut writer = BufWriter::new(File::create(dir.path().join(INDEX_FILE)).unwrap());
        writer.write_u32::<LittleEndian>(2).unwrap();
        writer.write_all(b"aa").unwrap();
        writer.write_u64::<LittleEndian>(entry_of_bb.offset).unwrap();
        writer.write_u64::<LittleEndian>(entry_of_bb.size).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let log = DiskLog::open(dir.path()).unwrap();
        assert!(matches!(log.read(b"aa"), Err(DiskError::Corrupt(_))));
    }

    #[test]
    fn torn_index_tail_is_skipped() {
        let dir = tempdir().unwrap();
        {
            let log = DiskLog::open(dir.path()).unwrap();
            log.append(b"k1", b"v1").unwrap();
        }

        // Append half an entry to the index file.
        let mut file = OpenOptions::new()
            .append(true)
            .open(dir.path().join(INDEX_FILE))
            .unwrap();
        file.write_u32::<LittleEndian>(2).unwrap();
        file.write_all(b"k2").unwrap();
        drop(file);

        let log = DiskLog::open(dir.path()).unwrap();
        assert_eq!(log.index_len(), 1);
        assert_eq!(log.read(b"k1").unwrap(), Some(b("v1")));
    }
}
