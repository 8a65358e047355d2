use crate::error::HarvestError;
use crate::harvest::record::{CommentRecord, UNKNOWN_AUTHOR};
use crate::harvest::warn::{self, WarnEvent};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// The on-disk layouts an archive file has gone through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreShape {
    Missing,
    /// `{"comments": [...]}`
    Wrapped,
    /// `[...]`
    Bare,
    Unreadable,
}

impl StoreShape {
    pub fn label(self) -> &'static str {
        match self {
            StoreShape::Missing => "missing",
            StoreShape::Wrapped => "wrapped",
            StoreShape::Bare => "bare-array",
            StoreShape::Unreadable => "unreadable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedStore {
    pub records: Vec<CommentRecord>,
    pub shape: StoreShape,
    pub dropped: usize,
}

impl LoadedStore {
    fn empty(shape: StoreShape) -> Self {
        Self {
            records: Vec::new(),
            shape,
            dropped: 0,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoreFile {
    Wrapped { comments: Vec<Value> },
    Bare(Vec<Value>),
}

#[derive(Deserialize)]
struct StoredEntry {
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
    timestamp: String,
    #[serde(default, alias = "message", alias = "text")]
    comment: String,
}

#[derive(Serialize)]
struct StoredEntryOut<'a> {
    author: &'a str,
    avatar: Option<&'a str>,
    timestamp: String,
    comment: &'a str,
}

#[derive(Serialize)]
struct StoreFileOut<'a> {
    comments: Vec<StoredEntryOut<'a>>,
}

/// Held for the read-modify-write of one archive; released on drop.
pub struct ArchiveLock {
    file: File,
}

impl Drop for ArchiveLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

pub fn lock_path_for(archive: &Path) -> PathBuf {
    let mut name = archive
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "archive".into());
    name.push(".lock");
    archive.with_file_name(name)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn ensure_dir(dir: &Path) -> Result<(), HarvestError> {
    fs::create_dir_all(dir).map_err(|source| HarvestError::ArchiveDirUnavailable {
        path: dir.to_path_buf(),
        source,
    })
}

pub fn lock(archive: &Path) -> Result<ArchiveLock, HarvestError> {
    ensure_dir(parent_dir(archive))?;
    let path = lock_path_for(archive);
    let lock_err = |source| HarvestError::ArchiveWriteFailed {
        path: path.clone(),
        source,
    };
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(lock_err)?;
    file.lock_exclusive().map_err(lock_err)?;
    Ok(ArchiveLock { file })
}

/// RFC 3339 first; older files wrote zone-less ISO-8601 in the source zone.
pub fn parse_stored_instant(raw: &str, zone: Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .and_then(|naive| zone.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn warn_store(code: &str, path: &Path, reason: &str, err: &str) {
    warn::emit(WarnEvent {
        code,
        stage: "loading",
        source: &path.display().to_string(),
        reason,
        err,
    });
}

fn decode_entries(entries: Vec<Value>, zone: Tz, path: &Path) -> (Vec<CommentRecord>, usize) {
    let mut records = Vec::with_capacity(entries.len());
    let mut dropped = 0usize;
    for (index, value) in entries.into_iter().enumerate() {
        let entry: StoredEntry = match serde_json::from_value(value) {
            Ok(entry) => entry,
            Err(err) => {
                dropped += 1;
                warn_store(
                    "STORE_ENTRY_DROPPED",
                    path,
                    &format!("entry-{index}-malformed"),
                    &err.to_string(),
                );
                continue;
            }
        };
        let Some(timestamp) = parse_stored_instant(&entry.timestamp, zone) else {
            dropped += 1;
            warn_store(
                "STORE_ENTRY_DROPPED",
                path,
                &format!("entry-{index}-bad-timestamp"),
                &entry.timestamp,
            );
            continue;
        };
        let author = entry
            .author
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
        records.push(CommentRecord {
            author,
            avatar_url: entry.avatar.filter(|a| !a.trim().is_empty()),
            timestamp,
            text: entry.comment.trim().to_string(),
            degraded: false,
        });
    }
    (records, dropped)
}

/// Read an archive in any known layout. Never fails: an absent, unreadable
/// or unrecognizable file loads as an empty store.
pub fn load(path: &Path, zone: Tz) -> LoadedStore {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return LoadedStore::empty(StoreShape::Missing);
        }
        Err(err) => {
            warn_store("STORE_UNREADABLE", path, "read-failed", &err.to_string());
            return LoadedStore::empty(StoreShape::Unreadable);
        }
    };

    let (entries, shape) = match serde_json::from_str::<StoreFile>(&raw) {
        Ok(StoreFile::Wrapped { comments }) => (comments, StoreShape::Wrapped),
        Ok(StoreFile::Bare(entries)) => (entries, StoreShape::Bare),
        Err(err) => {
            warn_store("STORE_UNREADABLE", path, "parse-failed", &err.to_string());
            return LoadedStore::empty(StoreShape::Unreadable);
        }
    };

    let (records, dropped) = decode_entries(entries, zone, path);
    LoadedStore {
        records,
        shape,
        dropped,
    }
}

pub fn render(records: &[CommentRecord]) -> serde_json::Result<String> {
    let out = StoreFileOut {
        comments: records
            .iter()
            .map(|r| StoredEntryOut {
                author: &r.author,
                avatar: r.avatar_url.as_deref(),
                timestamp: format_instant(&r.timestamp),
                comment: &r.text,
            })
            .collect(),
    };
    let mut body = serde_json::to_string_pretty(&out)?;
    body.push('\n');
    Ok(body)
}

/// Replace the archive in one rename. On any error the previous file is
/// left as it was.
pub fn save(path: &Path, records: &[CommentRecord]) -> Result<(), HarvestError> {
    let dir = parent_dir(path);
    ensure_dir(dir)?;

    let write_err = |source| HarvestError::ArchiveWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let body = render(records).map_err(|err| write_err(std::io::Error::other(err)))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(body.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}
