//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Append-only JSON-lines logs backing the event-log store."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Digest;
use tracing::warn;

use crate::{PersistenceError, Result};

/// Layout version written into every log header.
pub const LOG_FORMAT_VERSION: u16 = 1;

/// First line of every log file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogHeader {
    version: u16,
    kind: String,
    created_at: DateTime<Utc>,
    hash: String,
}

impl LogHeader {
    fn new(kind: &str) -> Self {
        let created_at = Utc::now();
        let mut hasher = sha2::Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update(created_at.to_rfc3339().as_bytes());
        Self {
            version: LOG_FORMAT_VERSION,
            kind: kind.to_owned(),
            created_at,
            hash: format!("{:x}", hasher.finalize()),
        }
    }
}

/// A record together with the bookkeeping assigned on append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry<T> {
    /// Sequence number, starting at 1 and strictly increasing per file.
    pub sequence: u64,
    /// Wall-clock time of the append.
    pub recorded_at: DateTime<Utc>,
    /// The stored record.
    pub record: T,
}

#[derive(Serialize)]
struct LogEntryRef<'a, T> {
    sequence: u64,
    recorded_at: DateTime<Utc>,
    record: &'a T,
}

/// Append-only writer for one log file.
pub struct EventLogWriter {
    path: PathBuf,
    kind: String,
    writer: BufWriter<File>,
    last_sequence: u64,
}

impl EventLogWriter {
    /// Open `path` for appending, writing a header when the file is new or empty.
    /// An existing file must carry a header of the same `kind`.
    pub fn open(path: &Path, kind: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let fresh = !path.exists() || truncate_torn_tail(path)? == 0;
        let last_sequence = if fresh {
            0
        } else {
            read_header(path, kind)?;
            last_sequence(path)?
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        if fresh {
            let line = serde_json::to_string(&LogHeader::new(kind))?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            kind: kind.to_owned(),
            writer,
            last_sequence,
        })
    }

    /// Append `record`, returning the assigned sequence number and bytes written.
    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<(u64, usize)> {
        let sequence = self.last_sequence + 1;
        let line = serde_json::to_string(&LogEntryRef {
            sequence,
            recorded_at: Utc::now(),
            record,
        })?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.last_sequence = sequence;
        Ok((sequence, line.len() + 1))
    }

    /// Sequence number of the most recent entry, zero for an empty log.
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }
}

impl std::fmt::Debug for EventLogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogWriter")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("last_sequence", &self.last_sequence)
            .finish()
    }
}

/// Cut a trailing line that was not fully written, so the next append starts
/// on a fresh line. Returns the remaining length of the file.
fn truncate_torn_tail(path: &Path) -> Result<u64> {
    let contents = fs::read(path)?;
    if contents.is_empty() || contents.ends_with(b"\n") {
        return Ok(contents.len() as u64);
    }
    let keep = contents
        .iter()
        .rposition(|byte| *byte == b'\n')
        .map_or(0, |index| index + 1);
    warn!(
        path = %path.display(),
        dropped_bytes = contents.len() - keep,
        "truncating incomplete trailing log entry"
    );
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(keep as u64)?;
    file.sync_all()?;
    Ok(keep as u64)
}

fn read_header(path: &Path, kind: &str) -> Result<LogHeader> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut first_line = String::new();
    reader.read_line(&mut first_line)?;
    let header: LogHeader = serde_json::from_str(first_line.trim_end()).map_err(|err| {
        PersistenceError::Storage(format!(
            "log {} has no readable header: {err}",
            path.display()
        ))
    })?;
    if header.version != LOG_FORMAT_VERSION {
        return Err(PersistenceError::Storage(format!(
            "log {} uses format version {}, expected {}",
            path.display(),
            header.version,
            LOG_FORMAT_VERSION
        )));
    }
    if header.kind != kind {
        return Err(PersistenceError::Storage(format!(
            "log {} holds {} records, expected {}",
            path.display(),
            header.kind,
            kind
        )));
    }
    Ok(header)
}

#[derive(Deserialize)]
struct SequenceOnly {
    sequence: u64,
}

fn last_sequence(path: &Path) -> Result<u64> {
    let reader = BufReader::new(File::open(path)?);
    let mut last = 0u64;
    for line in reader.lines().skip(1) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(entry) = serde_json::from_str::<SequenceOnly>(&line) {
            last = entry.sequence;
        }
    }
    Ok(last)
}

/// Replay the entries of `path` in order. A missing file replays nothing.
pub fn replay<T, F>(path: &Path, kind: &str, mut handler: F) -> Result<usize>
where
    T: DeserializeOwned,
    F: FnMut(LogEntry<T>) -> Result<()>,
{
    if !path.exists() || fs::metadata(path)?.len() == 0 {
        return Ok(0);
    }
    read_header(path, kind)?;
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0usize;
    let mut lines = reader.lines().skip(1).peekable();
    while let Some(line) = lines.next() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: LogEntry<T> = match serde_json::from_str(&line) {
            Ok(entry) => entry,
            // A torn final entry is dropped; damage anywhere else is an error.
            Err(err) if lines.peek().is_none() => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "skipping unreadable final log entry"
                );
                break;
            }
            Err(err) => return Err(err.into()),
        };
        handler(entry)?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    #[test]
    fn append_and_replay_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("readings.log");
        let mut writer = EventLogWriter::open(&path, "reading").unwrap();
        writer.append(&json!({"value": 1})).unwrap();
        writer.append(&json!({"value": 2})).unwrap();

        let mut seen = Vec::new();
        let count = replay::<Value, _>(&path, "reading", |entry| {
            seen.push((entry.sequence, entry.record["value"].as_i64().unwrap()));
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 2);
        assert_eq!(seen, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn reopening_resumes_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("equipment.log");
        {
            let mut writer = EventLogWriter::open(&path, "equipment").unwrap();
            writer.append(&json!({"n": 1})).unwrap();
            writer.append(&json!({"n": 2})).unwrap();
        }
        let mut writer = EventLogWriter::open(&path, "equipment").unwrap();
        assert_eq!(writer.last_sequence(), 2);
        let (sequence, bytes) = writer.append(&json!({"n": 3})).unwrap();
        assert_eq!(sequence, 3);
        assert!(bytes > 0);
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mixed.log");
        EventLogWriter::open(&path, "equipment").unwrap();
        let err = EventLogWriter::open(&path, "reading").unwrap_err();
        assert!(matches!(err, PersistenceError::Storage(_)));
    }

    #[test]
    fn missing_log_replays_nothing() {
        let dir = tempdir().unwrap();
        let count =
            replay::<Value, _>(&dir.path().join("absent.log"), "reading", |_| Ok(())).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn torn_tail_is_cut_before_appending() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("readings.log");
        {
            let mut writer = EventLogWriter::open(&path, "reading").unwrap();
            writer.append(&json!({"value": 1})).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"sequence":2,"recorded_at":"2026"#).unwrap();
        drop(file);

        let mut writer = EventLogWriter::open(&path, "reading").unwrap();
        assert_eq!(writer.last_sequence(), 1);
        assert_eq!(writer.append(&json!({"value": 2})).unwrap().0, 2);

        let mut values = Vec::new();
        replay::<Value, _>(&path, "reading", |entry| {
            values.push(entry.record["value"].as_i64().unwrap());
            Ok(())
        })
        .unwrap();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn torn_header_starts_a_fresh_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("equipment.log");
        fs::write(&path, br#"{"version":1,"kin"#).unwrap();
        let mut writer = EventLogWriter::open(&path, "equipment").unwrap();
        assert_eq!(writer.last_sequence(), 0);
        writer.append(&json!({"n": 1})).unwrap();
        let count = replay::<Value, _>(&path, "equipment", |_| Ok(())).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn unreadable_final_entry_is_skipped_on_replay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("readings.log");
        let mut writer = EventLogWriter::open(&path, "reading").unwrap();
        writer.append(&json!({"value": 1})).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"sequence\":2,\"rec").unwrap();

        let count = replay::<Value, _>(&path, "reading", |_| Ok(())).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn damage_before_the_last_entry_fails_replay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("readings.log");
        let mut writer = EventLogWriter::open(&path, "reading").unwrap();
        writer.append(&json!({"value": 1})).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"garbage\n").unwrap();
        drop(file);
        writer.append(&json!({"value": 2})).unwrap();

        let err = replay::<Value, _>(&path, "reading", |_| Ok(())).unwrap_err();
        assert!(matches!(err, PersistenceError::Json(_)));
    }
}
