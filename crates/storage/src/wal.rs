// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log of worker status operations
//!
//! One JSON entry per line. Several workers may append to the same log, so
//! appends go through a single `write` per batch on an `O_APPEND` handle.
//! A write that fails partway is truncated back off the file, so a later
//! batch never lands after a fragment.

use pb_core::Operation;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// File operations the log needs
pub trait LogFile: Write + Send {
    fn size(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl LogFile for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

/// Append-only log of [`Operation`]s
pub struct Wal<F: LogFile = File> {
    file: F,
    sequence: u64,
    /// Length to cut back to before the next append, left by a failed write
    /// whose rollback also failed
    torn_at: Option<u64>,
}

impl Wal {
    /// Open or create a WAL at the given path
    pub fn open(path: &Path) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        let reader = BufReader::new(File::open(path)?);
        let sequence = reader.lines().count() as u64;

        Ok(Self::with_file(file, sequence))
    }

    /// Replay all operations from the log
    ///
    /// A torn final line (crash mid-append) is skipped with a warning; a bad
    /// line anywhere else is an error.
    pub fn replay(path: &Path) -> Result<Vec<Operation>, WalError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines = BufReader::new(file)
            .lines()
            .collect::<Result<Vec<_>, _>>()?;
        let last = lines.len().saturating_sub(1);
        let mut ops = Vec::with_capacity(lines.len());

        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<WalEntry>(line) {
                Ok(entry) => ops.push(entry.op),
                Err(e) if i == last => {
                    tracing::warn!(error = %e, "skipping torn WAL tail");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(ops)
    }
}

impl<F: LogFile> Wal<F> {
    /// Wrap an already open log whose last entry is `sequence`
    pub fn with_file(file: F, sequence: u64) -> Self {
        Self {
            file,
            sequence,
            torn_at: None,
        }
    }

    /// Append one operation and sync
    pub fn append(&mut self, op: &Operation) -> Result<u64, WalError> {
        self.append_batch(std::slice::from_ref(op))
    }

    /// Append several operations with a single write and sync
    pub fn append_batch(&mut self, ops: &[Operation]) -> Result<u64, WalError> {
        if ops.is_empty() {
            return Ok(self.sequence);
        }
        let mut buf = Vec::new();
        let mut seq = self.sequence;
        for op in ops {
            seq += 1;
            serde_json::to_writer(&mut buf, &WalEntry { seq, op: op.clone() })?;
            buf.push(b'\n');
        }

        if let Some(len) = self.torn_at {
            self.file.truncate(len)?;
            self.torn_at = None;
        }
        // A partial write must not stay in front of the next batch
        let start = self.file.size()?;
        if let Err(e) = self.file.write_all(&buf).and_then(|()| self.file.sync()) {
            self.rollback(start);
            return Err(e.into());
        }
        self.sequence = seq;
        Ok(self.sequence)
    }

    /// Get the current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Cut off whatever a failed write left behind
    fn rollback(&mut self, start: u64) {
        match self.file.truncate(start) {
            Ok(()) => self.torn_at = None,
            Err(e) => {
                tracing::warn!(len = start, error = %e, "failed to roll back partial WAL write");
                self.torn_at = Some(start);
            }
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct WalEntry {
    seq: u64,
    op: Operation,
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
