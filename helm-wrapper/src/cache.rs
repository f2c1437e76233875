use std::{
  fs::{self, DirBuilder},
  io::{self, ErrorKind},
  os::unix::fs::DirBuilderExt,
  path::Path,
};

use fs4::tokio::AsyncFileExt;
use tokio::{
  fs::{File, OpenOptions},
  task,
};
use tracing::debug;

use crate::error::Result;

/// Make sure `path` exists, creating it and any missing parents with mode 0755
///
/// An existing entry is accepted as is, even when it is not a directory.
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
  let path = path.as_ref();
  match fs::metadata(path) {
    Ok(_) => return Ok(()),
    Err(err) if err.kind() != ErrorKind::NotFound => return Err(err.into()),
    Err(_) => {}
  }

  debug!("Creating cache directory {}", path.display());
  DirBuilder::new().recursive(true).mode(0o755).create(path)?;

  Ok(())
}

/// Whether a file exists at `path`
///
/// Only "not found" maps to `false`, any other error (e.g. permission denied) is returned.
pub fn is_installed<P: AsRef<Path>>(path: P) -> Result<bool> {
  match fs::metadata(path) {
    Ok(_) => Ok(true),
    Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
    Err(err) => Err(err.into()),
  }
}

/// Exclusive advisory lock serializing installs of one version across processes
///
/// The lock is released when the value is dropped. The lock file itself is left in place so that
/// a waiting process never ends up holding a lock on an unlinked inode.
#[derive(Debug)]
pub struct InstallLock {
  _file: File,
}

impl InstallLock {
  /// Wait until the lock for `version` inside `cache_dir` is held
  ///
  /// `flock` blocks the calling thread, so the wait happens on the blocking pool.
  pub async fn acquire(cache_dir: &Path, version: &str) -> Result<Self> {
    let path = cache_dir.join(format!(".helm-{version}.lock"));
    let file = OpenOptions::new()
      .create(true)
      .truncate(false)
      .read(true)
      .write(true)
      .open(&path)
      .await?;

    debug!("Waiting for install lock {}", path.display());
    let file = task::spawn_blocking(move || file.lock_exclusive().map(|()| file))
      .await
      .map_err(io::Error::from)??;

    Ok(InstallLock { _file: file })
  }
}
