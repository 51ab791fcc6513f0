//! Snapshot, atomic commit and rollback for a single file.

use crate::{LoopError, Result};
use scdloop_format::ScdFile;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

/// Suffix of the sibling backup file kept while a write is in flight.
pub const BACKUP_SUFFIX: &str = ".scdloop-backup";

/// Points at which a test can force a write to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// After the in-memory image has been partly modified.
    AfterPartialMutation,
    /// After the new image is on disk in the temporary file, before the rename.
    BeforeRename,
    /// After the new image has replaced the original.
    AfterRename,
}

/// Fault injection plan. Empty by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    pub fail_at: Option<FaultPoint>,
}

impl FaultPlan {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn at(point: FaultPoint) -> Self {
        Self {
            fail_at: Some(point),
        }
    }

    pub(crate) fn check(&self, point: FaultPoint) -> Result<()> {
        if self.fail_at == Some(point) {
            tracing::warn!(?point, "Injecting write fault");
            return Err(LoopError::Io(io::Error::other(format!(
                "injected fault at {point:?}"
            ))));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Open,
    Committed,
    RolledBack,
}

/// A mutation of one file in progress.
///
/// `begin` snapshots the file's bytes in memory and in a sibling backup
/// file. `commit` writes the new image to a sibling temporary file, syncs
/// it and renames it over the original. Until `commit` succeeds, `rollback`
/// (or dropping the transaction) puts the snapshot back.
pub struct Transaction {
    path: PathBuf,
    snapshot: Vec<u8>,
    backup: Option<NamedTempFile>,
    keep_backup_on_failure: bool,
    faults: FaultPlan,
    outcome: Outcome,
}

impl Transaction {
    /// Snapshot `path` before mutating it.
    ///
    /// Symlinks are resolved here, so the backup, the temporary file and
    /// the rename all act on the target file and the link is left alone.
    pub fn begin(path: &Path, keep_backup_on_failure: bool, faults: FaultPlan) -> Result<Self> {
        let path = fs::canonicalize(path)?;
        let snapshot = fs::read(&path)?;
        let dir = parent_dir(&path);

        let mut backup = Builder::new()
            .prefix(&backup_prefix(&path))
            .suffix(BACKUP_SUFFIX)
            .tempfile_in(dir)?;
        backup.write_all(&snapshot)?;
        backup.as_file().sync_all()?;

        tracing::debug!(
            path = %path.display(),
            backup = %backup.path().display(),
            bytes = snapshot.len(),
            "Snapshot taken"
        );

        Ok(Self {
            path,
            snapshot,
            backup: Some(backup),
            keep_backup_on_failure,
            faults,
            outcome: Outcome::Open,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The bytes the file held when the transaction began.
    pub fn snapshot(&self) -> &[u8] {
        &self.snapshot
    }

    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    /// Atomically replace the file with `image` and verify the result.
    pub fn commit(&mut self, image: &[u8]) -> Result<()> {
        if image == self.snapshot.as_slice() {
            tracing::debug!(path = %self.path.display(), "Image unchanged, nothing to commit");
            self.finish(Outcome::Committed);
            return Ok(());
        }

        replace_atomically(&self.path, image, &self.faults)?;
        self.faults.check(FaultPoint::AfterRename)?;

        let written = fs::read(&self.path)?;
        if written != image {
            return Err(LoopError::Io(io::Error::other(
                "file contents differ from the committed image",
            )));
        }
        ScdFile::from_bytes(written)?;

        self.finish(Outcome::Committed);
        Ok(())
    }

    /// Put the snapshot back if the file no longer holds it.
    pub fn rollback(&mut self) -> Result<()> {
        if self.outcome != Outcome::Open {
            return Ok(());
        }

        let intact = fs::read(&self.path).is_ok_and(|current| current == self.snapshot);
        if !intact {
            if let Err(err) = replace_atomically(&self.path, &self.snapshot, &FaultPlan::none()) {
                let backup = self.keep_backup();
                tracing::error!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    error = %err,
                    "Restoring snapshot failed"
                );
                self.outcome = Outcome::RolledBack;
                return Err(LoopError::RollbackFailed {
                    path: self.path.clone(),
                    backup,
                    source: match err {
                        LoopError::Io(e) => e,
                        other => io::Error::other(other.to_string()),
                    },
                });
            }
        }

        tracing::warn!(
            path = %self.path.display(),
            restored = !intact,
            "Rolled back write"
        );

        if self.keep_backup_on_failure {
            let backup = self.keep_backup();
            tracing::info!(backup = %backup.display(), "Kept backup of original file");
        }
        self.finish(Outcome::RolledBack);
        Ok(())
    }

    fn finish(&mut self, outcome: Outcome) {
        self.outcome = outcome;
        // Dropping the temp file removes it.
        self.backup.take();
    }

    /// Detach the backup from cleanup and return its path.
    fn keep_backup(&mut self) -> PathBuf {
        match self.backup.take() {
            Some(backup) => match backup.keep() {
                Ok((_, path)) => path,
                Err(err) => err.file.path().to_path_buf(),
            },
            None => self.path.clone(),
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.outcome == Outcome::Open {
            tracing::warn!(path = %self.path.display(), "Transaction dropped while open");
            if let Err(err) = self.rollback() {
                tracing::error!(error = %err, "Rollback on drop failed");
            }
        }
    }
}

/// Write `image` to a sibling temporary file and rename it over `path`.
fn replace_atomically(path: &Path, image: &[u8], faults: &FaultPlan) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(parent_dir(path))?;
    tmp.write_all(image)?;
    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    tmp.as_file().sync_all()?;
    faults.check(FaultPoint::BeforeRename)?;
    tmp.persist(path).map_err(|e| LoopError::Io(e.error))?;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn backup_prefix(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(".{name}.")
}
