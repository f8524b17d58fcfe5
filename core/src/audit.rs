//! Append-only audit sinks.
//!
//! The controller writes exactly one entry per state change, before the change
//! is committed. A sink that cannot accept a write blocks the mutation.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use bastion_types::{AuditAction, AuditEntry, AuditError};

/// Destination for audit records. Must never reject a well-formed write
/// while healthy.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError>;

    /// Most recent entries, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, AuditError>;
}

/// In-process audit log. Can be toggled unavailable to exercise the
/// blocked-mutation path.
#[derive(Debug)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
    available: AtomicBool,
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn actions(&self) -> Vec<AuditAction> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|entry| entry.action)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(AuditError::Unavailable {
                reason: "memory audit log disabled".to_string(),
            });
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, AuditError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}

/// Durable audit log: one JSON object per line, synced on every append.
#[derive(Debug)]
pub struct JsonlAuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditLog {
    /// Open (or create) the log for appending. The parent directory is
    /// created if missing; on Unix the file is owner read/write only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;
        if ends_mid_line(path)? {
            tracing::warn!(path = %path.display(), "Audit log ends in a torn line; terminating it");
            file.write_all(b"\n")?;
            file.sync_data()?;
        }
        tracing::debug!(path = %path.display(), "Audit log opened");

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditLog {
    fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let len = file.metadata()?.len();
        if let Err(err) = write_synced(&mut file, line.as_bytes()) {
            // A partial write must not run into the next entry.
            if let Err(rollback) = file.set_len(len) {
                tracing::error!(path = %self.path.display(), error = %rollback, "Audit log rollback failed");
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, AuditError> {
        // Hold the writer lock so a concurrent append cannot leave a torn line.
        let _guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::warn!(path = %self.path.display(), error = %err, "Skipping unreadable audit line");
                }
            }
        }
        Ok(entries.into_iter().rev().take(limit).collect())
    }
}

fn write_synced(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_data()
}

/// Whether a non-empty file lacks its trailing newline.
fn ends_mid_line(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
