/// Durable, per-session history of file moves.
///
/// The log is a JSON Lines file: one [`FileMoveRecord`] per line, in append order. Appends
/// are a single synced line write, so a record is durable once [`SessionLogStore::append`]
/// returns. Deletions rewrite the file into a sibling and rename it over the original, so
/// readers see either the whole session or none of it.
use crate::error::LogStoreFailure;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// One successful move, as it was performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMoveRecord {
    /// Store-assigned, strictly increasing across the whole log.
    pub seq: u64,
    pub session_id: Uuid,
    /// Canonical directory the sort ran on.
    pub root: PathBuf,
    pub filename: String,
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub moved_at: DateTime<Local>,
}

/// A record before the store has numbered it.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub session_id: Uuid,
    pub root: PathBuf,
    pub filename: String,
    pub original_path: PathBuf,
    pub new_path: PathBuf,
}

pub type StoreResult<T> = Result<T, LogStoreFailure>;

/// Handle on a session log file.
#[derive(Debug)]
pub struct SessionLogStore {
    path: PathBuf,
    next_seq: u64,
}

impl SessionLogStore {
    /// Opens the log at `path`, creating it (and its parent directory) if absent.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let io_err = |source| LogStoreFailure::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        let path = fs::canonicalize(path).map_err(io_err)?;

        let mut store = Self { path, next_seq: 1 };
        store.repair_tail()?;
        store.next_seq = store
            .read_all()?
            .iter()
            .map(|record| record.seq + 1)
            .max()
            .unwrap_or(1);
        debug!(log = %store.path.display(), next_seq = store.next_seq, "session log opened");
        Ok(store)
    }

    /// Canonical location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file used while rewriting the log.
    pub fn scratch_path(&self) -> PathBuf {
        self.path.with_extension("jsonl.tmp")
    }

    /// Persists one record and returns it with its sequence number.
    pub fn append(&mut self, record: NewRecord) -> StoreResult<FileMoveRecord> {
        let record = FileMoveRecord {
            seq: self.next_seq,
            session_id: record.session_id,
            root: record.root,
            filename: record.filename,
            original_path: record.original_path,
            new_path: record.new_path,
            moved_at: Local::now(),
        };

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        // A failed earlier write may have left a partial line; never append onto it.
        self.repair_tail()?;

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.sync_data())
            .map_err(|source| self.io_error(source))?;

        self.next_seq += 1;
        Ok(record)
    }

    /// The session that appended last, if any.
    pub fn latest_session(&self) -> StoreResult<Option<Uuid>> {
        Ok(self
            .read_all()?
            .into_iter()
            .max_by_key(|record| record.seq)
            .map(|record| record.session_id))
    }

    /// Every record of a session, in append order.
    pub fn records_for(&self, session_id: Uuid) -> StoreResult<Vec<FileMoveRecord>> {
        let mut records: Vec<_> = self
            .read_all()?
            .into_iter()
            .filter(|record| record.session_id == session_id)
            .collect();
        records.sort_by_key(|record| record.seq);
        Ok(records)
    }

    /// Up to `limit` records across all sessions, newest first.
    pub fn recent(&self, limit: usize) -> StoreResult<Vec<FileMoveRecord>> {
        let mut records = self.read_all()?;
        records.sort_by(|a, b| b.seq.cmp(&a.seq));
        records.truncate(limit);
        Ok(records)
    }

    /// Number of distinct sessions in the log.
    pub fn session_count(&self) -> StoreResult<usize> {
        let mut ids: Vec<_> = self
            .read_all()?
            .into_iter()
            .map(|record| record.session_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids.len())
    }

    /// Removes every record of a session.
    pub fn delete_session(&self, session_id: Uuid) -> StoreResult<usize> {
        self.rewrite_without(|record| record.session_id == session_id)
    }

    /// Removes selected records of a session, leaving the rest of it in place.
    pub fn remove_records(&self, session_id: Uuid, seqs: &[u64]) -> StoreResult<usize> {
        self.rewrite_without(|record| {
            record.session_id == session_id && seqs.contains(&record.seq)
        })
    }

    /// Makes the log end on a line boundary.
    ///
    /// A trailing fragment that parses as a record only lacks its newline, which is added. Any
    /// other fragment is a torn append whose call never returned `Ok`, and is cut off.
    fn repair_tail(&self) -> StoreResult<()> {
        if !self.ends_mid_line()? {
            return Ok(());
        }

        let contents = fs::read(&self.path).map_err(|source| self.io_error(source))?;
        let tail_start = contents
            .iter()
            .rposition(|&byte| byte == b'\n')
            .map_or(0, |index| index + 1);
        let tail = &contents[tail_start..];

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        let repaired = if serde_json::from_slice::<FileMoveRecord>(tail).is_ok() {
            debug!(log = %self.path.display(), "terminating last record");
            file.write_all(b"\n")
        } else {
            warn!(
                log = %self.path.display(),
                bytes = tail.len(),
                "dropping truncated last line"
            );
            file.set_len(tail_start as u64)
        };
        repaired
            .and_then(|()| file.sync_data())
            .map_err(|source| self.io_error(source))
    }

    fn ends_mid_line(&self) -> StoreResult<bool> {
        let mut file = File::open(&self.path).map_err(|source| self.io_error(source))?;
        let len = file
            .metadata()
            .map_err(|source| self.io_error(source))?
            .len();
        if len == 0 {
            return Ok(false);
        }

        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))
            .and_then(|_| file.read_exact(&mut last))
            .map_err(|source| self.io_error(source))?;
        Ok(last[0] != b'\n')
    }

    fn rewrite_without<F>(&self, drop: F) -> StoreResult<usize>
    where
        F: Fn(&FileMoveRecord) -> bool,
    {
        let records = self.read_all()?;
        let before = records.len();
        let kept: Vec<_> = records.into_iter().filter(|record| !drop(record)).collect();
        let removed = before - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let mut contents = String::new();
        for record in &kept {
            contents.push_str(&serde_json::to_string(record)?);
            contents.push('\n');
        }

        let tmp_path = self.scratch_path();
        let mut tmp = File::create(&tmp_path).map_err(|source| self.io_error(source))?;
        tmp.write_all(contents.as_bytes())
            .and_then(|()| tmp.sync_all())
            .map_err(|source| self.io_error(source))?;
        fs::rename(&tmp_path, &self.path).map_err(|source| self.io_error(source))?;

        debug!(removed, remaining = kept.len(), "session log rewritten");
        Ok(removed)
    }

    fn read_all(&self) -> StoreResult<Vec<FileMoveRecord>> {
        let file = File::open(&self.path).map_err(|source| self.io_error(source))?;
        let lines = BufReader::new(file)
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| self.io_error(source))?;

        let last_line = lines.len();
        let mut records = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FileMoveRecord>(line) {
                Ok(record) => records.push(record),
                // A crash mid-append leaves a torn final line; that record never returned Ok.
                Err(e) if index + 1 == last_line => {
                    warn!(log = %self.path.display(), error = %e, "ignoring truncated last line");
                }
                Err(e) => {
                    return Err(LogStoreFailure::Corrupt {
                        path: self.path.clone(),
                        line: index + 1,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(records)
    }

    fn io_error(&self, source: std::io::Error) -> LogStoreFailure {
        LogStoreFailure::Io {
            path: self.path.clone(),
            source,
        }
    }
}
