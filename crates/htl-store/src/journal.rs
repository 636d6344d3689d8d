//! File-backed record store.
//!
//! State lives in memory; durability comes from an append-only journal of
//! store mutations. On open the journal is replayed front to back.
//!
//! On-disk format, one frame per mutation:
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized JournalOp)]
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cursor::{KeyValue, QueryCursor};
use crate::error::{StoreError, StoreResult};
use crate::memory::{check_key, InMemoryRecordStore};
use crate::selector::Selector;
use crate::traits::RecordStore;

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// A single journaled mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum JournalOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

/// Configuration for the journaled store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JournalConfig {
    /// `fsync` after every appended frame instead of relying on the OS cache.
    pub sync_on_write: bool,
}

struct JournalWriter {
    writer: BufWriter<File>,
    /// End of the last complete frame on disk.
    offset: u64,
    /// Set when an append failed and the writer could not be reset.
    dirty: bool,
}

/// Record store persisted through an append-only journal file.
///
/// Mutations are appended to the journal before they are applied in memory,
/// so a crash never leaves memory ahead of disk. Reads and queries are served
/// from memory. A torn frame at the tail (from a crash mid-append) is
/// truncated on open; a frame failing its CRC check mid-file is skipped. A
/// damaged frame header followed by further intact frames fails the open with
/// [`StoreError::CorruptJournal`] and leaves the file as it was.
pub struct JournaledRecordStore {
    path: PathBuf,
    config: JournalConfig,
    journal: Mutex<JournalWriter>,
    state: InMemoryRecordStore,
}

impl JournaledRecordStore {
    /// Open (or create) the journal at `path` and replay it.
    pub fn open(path: impl AsRef<Path>, config: JournalConfig) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let state = InMemoryRecordStore::new();
        let valid_len = if path.exists() {
            replay(&path, &state)?
        } else {
            0
        };

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        if file.metadata()?.len() > valid_len {
            warn!(
                path = %path.display(),
                valid_len,
                "discarding torn journal tail"
            );
            file.set_len(valid_len)?;
        }
        file.seek(SeekFrom::End(0))?;

        info!(path = %path.display(), records = state.len(), "journal opened");
        Ok(Self {
            path,
            config,
            journal: Mutex::new(JournalWriter {
                writer: BufWriter::new(file),
                offset: valid_len,
                dirty: false,
            }),
            state,
        })
    }

    /// Path to the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current journal length in bytes.
    pub fn journal_len(&self) -> StoreResult<u64> {
        Ok(self.lock_journal()?.offset)
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Number of query cursors handed out and not yet closed.
    pub fn open_cursors(&self) -> usize {
        self.state.open_cursors()
    }

    /// Rewrite the journal as one `Put` per live record, dropping overwritten
    /// values and deletions. Returns the number of records written.
    pub fn compact(&self) -> StoreResult<usize> {
        let mut journal = self.lock_journal()?;
        let entries = self.state.entries()?;

        let tmp_path = self.path.with_extension("compact");
        let (file, offset) = match write_snapshot(&tmp_path, &entries) {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };
        // The new handle already exists; a failed rename leaves the writer as is.
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        let before = journal.offset;
        let stale = mem::replace(&mut journal.writer, BufWriter::new(file));
        let _ = stale.into_parts();
        journal.offset = offset;
        journal.dirty = false;

        info!(records = entries.len(), before, after = offset, "journal compacted");
        Ok(entries.len())
    }

    /// Append one frame. On failure the file is cut back to the last complete
    /// frame so a partial write never precedes the next one.
    fn append(&self, journal: &mut JournalWriter, op: &JournalOp) -> StoreResult<()> {
        if journal.dirty {
            self.reset_writer(journal)?;
        }
        match self.write_through(&mut journal.writer, op) {
            Ok(written) => {
                debug!(offset = journal.offset, len = written, "journal append");
                journal.offset += written;
                Ok(())
            }
            Err(e) => {
                if let Err(reset) = self.reset_writer(journal) {
                    warn!(error = %reset, "journal writer reset failed");
                    journal.dirty = true;
                }
                Err(e)
            }
        }
    }

    fn write_through(&self, writer: &mut BufWriter<File>, op: &JournalOp) -> StoreResult<u64> {
        let written = write_frame(writer, op)?;
        writer.flush()?;
        if self.config.sync_on_write {
            writer.get_ref().sync_all()?;
        }
        Ok(written)
    }

    /// Reopen the journal at the last complete frame, discarding whatever the
    /// old writer still buffers.
    fn reset_writer(&self, journal: &mut JournalWriter) -> StoreResult<()> {
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(journal.offset)?;
        file.seek(SeekFrom::End(0))?;
        let stale = mem::replace(&mut journal.writer, BufWriter::new(file));
        let _ = stale.into_parts();
        journal.dirty = false;
        warn!(offset = journal.offset, "journal writer reset");
        Ok(())
    }

    fn lock_journal(&self) -> StoreResult<MutexGuard<'_, JournalWriter>> {
        self.journal.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl RecordStore for JournaledRecordStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.state.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        check_key(key)?;
        let mut journal = self.lock_journal()?;
        self.append(
            &mut journal,
            &JournalOp::Put {
                key: key.to_string(),
                value: value.to_vec(),
            },
        )?;
        self.state.put(key, value)
    }

    fn delete(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        check_key(key)?;
        let mut journal = self.lock_journal()?;
        if !self.state.exists(key)? {
            return Ok(None);
        }
        self.append(
            &mut journal,
            &JournalOp::Delete {
                key: key.to_string(),
            },
        )?;
        self.state.delete(key)
    }

    fn query(&self, selector: &Selector) -> StoreResult<QueryCursor> {
        self.state.query(selector)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.state.exists(key)
    }
}

impl std::fmt::Debug for JournaledRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournaledRecordStore")
            .field("path", &self.path)
            .field("record_count", &self.state.len())
            .finish()
    }
}

fn write_frame(writer: &mut impl Write, op: &JournalOp) -> StoreResult<u64> {
    let payload = bincode::serialize(op).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| StoreError::Serialization("journal frame exceeds 4 GiB".into()))?;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&length.to_le_bytes())?;
    writer.write_all(&crc.to_le_bytes())?;
    writer.write_all(&payload)?;
    Ok(HEADER_SIZE as u64 + payload.len() as u64)
}

/// Write one `Put` frame per entry to a fresh file at `path` and sync it.
/// Returns an append handle on the new file and its length.
fn write_snapshot(path: &Path, entries: &[KeyValue]) -> StoreResult<(File, u64)> {
    let mut tmp = BufWriter::new(File::create(path)?);
    let mut offset = 0u64;
    for kv in entries {
        offset += write_frame(
            &mut tmp,
            &JournalOp::Put {
                key: kv.key.clone(),
                value: kv.value.clone(),
            },
        )?;
    }
    tmp.flush()?;
    tmp.get_ref().sync_all()?;
    drop(tmp);
    let file = OpenOptions::new().append(true).open(path)?;
    Ok((file, offset))
}

/// What sits at one offset of the journal.
enum Frame {
    /// A well-formed frame.
    Op { op: JournalOp, len: usize },
    /// Header and payload are present but the CRC or the payload is bad.
    Damaged { len: usize, reason: String },
    /// Too few bytes remain for the frame the header describes.
    Incomplete,
}

fn parse_frame(buf: &[u8]) -> Frame {
    if buf.len() < HEADER_SIZE {
        return Frame::Incomplete;
    }
    let length = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let expected_crc = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    if length == 0 || length > buf.len() - HEADER_SIZE {
        return Frame::Incomplete;
    }

    let len = HEADER_SIZE + length;
    let payload = &buf[HEADER_SIZE..len];
    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Frame::Damaged {
            len,
            reason: format!("CRC mismatch (expected {expected_crc:#010x}, got {actual_crc:#010x})"),
        };
    }
    match bincode::deserialize::<JournalOp>(payload) {
        Ok(op) => Frame::Op { op, len },
        Err(e) => Frame::Damaged {
            len,
            reason: e.to_string(),
        },
    }
}

/// Offset of the first intact frame starting after `from`, if any.
fn next_intact_frame(bytes: &[u8], from: usize) -> Option<usize> {
    (from + 1..bytes.len().saturating_sub(HEADER_SIZE))
        .find(|&start| matches!(parse_frame(&bytes[start..]), Frame::Op { .. }))
}

/// Replay every valid frame into `state`. Returns the length of the valid
/// prefix of the file; anything after it is a torn tail.
///
/// An incomplete frame is only a torn tail when no intact frame follows it.
/// Otherwise its header is damaged and replay fails with
/// [`StoreError::CorruptJournal`].
fn replay(path: &Path, state: &InMemoryRecordStore) -> StoreResult<u64> {
    let bytes = fs::read(path)?;
    let mut offset = 0usize;
    let mut applied = 0usize;

    while offset < bytes.len() {
        match parse_frame(&bytes[offset..]) {
            Frame::Op { op, len } => {
                match op {
                    JournalOp::Put { key, value } => state.put(&key, &value)?,
                    JournalOp::Delete { key } => {
                        state.delete(&key)?;
                    }
                }
                applied += 1;
                offset += len;
            }
            Frame::Damaged { len, reason } => {
                warn!(offset, %reason, "skipping damaged journal frame");
                offset += len;
            }
            Frame::Incomplete => {
                if let Some(next) = next_intact_frame(&bytes, offset) {
                    warn!(offset, next, "damaged journal frame header");
                    return Err(StoreError::CorruptJournal {
                        offset: offset as u64,
                    });
                }
                warn!(offset, file_len = bytes.len(), "incomplete frame at journal tail");
                break;
            }
        }
    }

    debug!(applied, valid_len = offset, "journal replay complete");
    Ok(offset as u64)
}
