//! JSON persistence of ledger snapshots between invocations.

use std::{
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use fd_lock::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::error::LedgerError;
use crate::ledger::{Ledger, LedgerSnapshot};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no ledger at {0}; run `init` first")]
    Missing(PathBuf),
    #[error("ledger already exists at {0}")]
    Exists(PathBuf),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed ledger file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub fn load(path: &Path) -> Result<Ledger, StoreError> {
    if !path.exists() {
        return Err(StoreError::Missing(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(io_err(path))?;
    let snapshot: LedgerSnapshot =
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    let ledger = Ledger::restore(snapshot)?;
    debug!(path = %path.display(), height = ledger.height(), "ledger loaded");
    Ok(ledger)
}

/// Writes next to the target and renames, so a crash never leaves a
/// half-written ledger behind.
pub fn save(path: &Path, ledger: &Ledger) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let json = serde_json::to_vec_pretty(&ledger.snapshot()).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp).map_err(io_err(&tmp))?;
    f.write_all(&json).map_err(io_err(&tmp))?;
    f.sync_all().map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).map_err(io_err(path))?;
    debug!(path = %path.display(), bytes = json.len(), "ledger saved");
    Ok(())
}

/// Sidecar next to the state file; the state file itself is replaced on
/// every save, so it cannot carry the lock.
fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

fn open_lock(path: &Path) -> Result<RwLock<File>, StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let lock = lock_path(path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock)
        .map_err(io_err(&lock))?;
    Ok(RwLock::new(file))
}

/// Loads, runs `f` and, when `f` reports a change, saves, all under an
/// exclusive lock. Concurrent processes on the same state file therefore
/// apply their calls one after another instead of overwriting each other.
/// An error from `f` leaves the file untouched.
pub fn update<T>(
    path: &Path,
    f: impl FnOnce(&mut Ledger) -> Result<(T, bool), LedgerError>,
) -> Result<T, StoreError> {
    let mut lock = open_lock(path)?;
    let _guard = lock.write().map_err(io_err(&lock_path(path)))?;
    let mut ledger = load(path)?;
    let (out, changed) = f(&mut ledger)?;
    if changed {
        save(path, &ledger)?;
    }
    Ok(out)
}

/// Read-only access under a shared lock.
pub fn read<T>(path: &Path, f: impl FnOnce(&Ledger) -> T) -> Result<T, StoreError> {
    let lock = open_lock(path)?;
    let _guard = lock.read().map_err(io_err(&lock_path(path)))?;
    let ledger = load(path)?;
    Ok(f(&ledger))
}

/// Creates a fresh ledger file; refuses to clobber unless `force`.
pub fn create(path: &Path, ledger: &Ledger, force: bool) -> Result<(), StoreError> {
    let mut lock = open_lock(path)?;
    let _guard = lock.write().map_err(io_err(&lock_path(path)))?;
    if path.exists() && !force {
        return Err(StoreError::Exists(path.to_path_buf()));
    }
    save(path, ledger)
}
