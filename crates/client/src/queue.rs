//! Offline queue
//!
//! A flat directory of codec-encoded events, one event per file. The
//! directory listing is authoritative; there is no manifest.
//!
//! # File naming
//!
//! ```text
//! 01718000000000000123-6f1c0e9a4b2d4f0e8a7b1c2d3e4f5a6b
//! └ creation stamp ns ┘ └──────── random suffix ───────┘
//! ```
//!
//! The stamp is strictly increasing within one queue instance, so name
//! order and creation order agree. Files written by something else fall
//! back to their modification time. Entries are written to a dot-prefixed
//! temporary file first and renamed into place, so a reader never sees a
//! half-written event.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{ClientError, Result};

const TMP_SUFFIX: &str = ".tmp";

/// One persisted event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    path: PathBuf,
    name: String,
    created: u64,
}

impl QueueEntry {
    /// Full path of the entry file
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opaque unique file name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creation stamp in nanoseconds since the Unix epoch
    #[inline]
    pub fn created(&self) -> u64 {
        self.created
    }
}

/// Directory of queued events
#[derive(Debug)]
pub struct OfflineQueue {
    dir: PathBuf,
    last_stamp: AtomicU64,
}

impl OfflineQueue {
    /// Open a queue directory, creating it if missing
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| ClientError::queue(&dir, e))?;
        Ok(Self {
            dir,
            last_stamp: AtomicU64::new(0),
        })
    }

    /// Queue directory
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one encoded event under a fresh unique name
    pub fn push(&self, payload: &[u8]) -> Result<QueueEntry> {
        let created = self.next_stamp();
        let name = format!("{created:020}-{}", Uuid::new_v4().simple());
        let path = self.dir.join(&name);
        let tmp = self.dir.join(format!(".{name}{TMP_SUFFIX}"));

        fs::write(&tmp, payload).map_err(|e| ClientError::queue(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(ClientError::queue(&path, e));
        }

        tracing::trace!(entry = %name, bytes = payload.len(), "queued event");
        Ok(QueueEntry {
            path,
            name,
            created,
        })
    }

    /// List entries oldest first, ties broken by name
    pub fn entries(&self) -> Result<Vec<QueueEntry>> {
        let read_dir = fs::read_dir(&self.dir).map_err(|e| ClientError::queue(&self.dir, e))?;

        let mut entries = Vec::new();
        for item in read_dir {
            let item = item.map_err(|e| ClientError::queue(&self.dir, e))?;
            let Some(name) = item.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.starts_with('.') || name.ends_with(TMP_SUFFIX) {
                continue;
            }

            let file_type = match item.file_type() {
                Ok(t) => t,
                // Removed between listing and stat
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ClientError::queue(item.path(), e)),
            };
            if !file_type.is_file() {
                continue;
            }

            let created = match parse_stamp(&name) {
                Some(stamp) => stamp,
                None => modified_nanos(&item.path()).unwrap_or(0),
            };
            entries.push(QueueEntry {
                path: item.path(),
                name,
                created,
            });
        }

        entries.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }

    /// Number of entries currently queued
    pub fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read an entry's payload
    pub fn read(&self, entry: &QueueEntry) -> Result<Vec<u8>> {
        fs::read(&entry.path).map_err(|e| ClientError::queue(&entry.path, e))
    }

    /// Delete an entry; an already missing file is not an error
    pub fn remove(&self, entry: &QueueEntry) -> Result<()> {
        match fs::remove_file(&entry.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::queue(&entry.path, e)),
        }
    }

    /// Wall-clock nanoseconds, bumped past the previous stamp if needed
    fn next_stamp(&self) -> u64 {
        let now = Utc::now()
            .timestamp_nanos_opt()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);

        let mut last = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let next = now.max(last.saturating_add(1));
            match self.last_stamp.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }
}

fn parse_stamp(name: &str) -> Option<u64> {
    let (stamp, rest) = name.split_once('-')?;
    if stamp.len() != 20 || rest.is_empty() || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stamp.parse().ok()
}

fn modified_nanos(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let nanos = modified.duration_since(UNIX_EPOCH).ok()?.as_nanos();
    u64::try_from(nanos).ok()
}
