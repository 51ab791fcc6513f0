//! Single-writer-per-file gate.

use crate::{LoopError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Where a file is in its write lifecycle. Files with no write in flight
/// are `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Idle,
    Snapshotting,
    Mutating,
    Committed,
    RolledBack,
}

/// Tracks which files have a write in flight.
///
/// Keys are canonical paths, so two spellings of one file share a slot.
#[derive(Debug, Clone, Default)]
pub struct WriteGate {
    states: Arc<DashMap<PathBuf, WriteState>>,
}

static GLOBAL: OnceLock<WriteGate> = OnceLock::new();

impl WriteGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// The gate shared by every manager in the process.
    pub fn global() -> Self {
        GLOBAL.get_or_init(WriteGate::new).clone()
    }

    /// Claim `path` for a write. Fails fast with `Busy` if another write
    /// holds it.
    pub fn enter(&self, path: &Path) -> Result<GateGuard> {
        let key = canonical(path)?;
        match self.states.entry(key.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!(
                    path = %key.display(),
                    state = ?entry.get(),
                    "Write rejected, file busy"
                );
                Err(LoopError::Busy {
                    path: path.to_path_buf(),
                })
            }
            Entry::Vacant(entry) => {
                entry.insert(WriteState::Snapshotting);
                Ok(GateGuard {
                    states: Arc::clone(&self.states),
                    key,
                })
            }
        }
    }

    /// Current state of `path`.
    pub fn state(&self, path: &Path) -> WriteState {
        canonical(path)
            .ok()
            .and_then(|key| self.states.get(&key).map(|s| *s))
            .unwrap_or(WriteState::Idle)
    }
}

fn canonical(path: &Path) -> Result<PathBuf> {
    Ok(fs::canonicalize(path)?)
}

/// Holds a file's gate slot. Dropping it returns the file to `Idle`.
#[derive(Debug)]
pub struct GateGuard {
    states: Arc<DashMap<PathBuf, WriteState>>,
    key: PathBuf,
}

impl GateGuard {
    pub fn advance(&self, state: WriteState) {
        if let Some(mut slot) = self.states.get_mut(&self.key) {
            tracing::trace!(path = %self.key.display(), from = ?*slot, to = ?state, "Write state");
            *slot = state;
        }
    }

    /// Canonical path of the held file.
    pub fn path(&self) -> &Path {
        &self.key
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.states.remove(&self.key);
    }
}
