use std::{
  fs::{self, File, Permissions},
  io,
  os::unix::fs::PermissionsExt,
  path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, warn};

use crate::{
  config::Config,
  error::{Error, Result},
};

/// Removes the wrapped path when dropped, whatever happened in between
struct RemoveOnDrop<'a>(&'a Path);

impl Drop for RemoveOnDrop<'_> {
  fn drop(&mut self) {
    if let Err(err) = fs::remove_file(self.0) {
      if err.kind() != io::ErrorKind::NotFound {
        warn!("Unable to remove {}: {err}", self.0.display());
      }
    }
  }
}

/// Extract the Helm binary for `version` from its downloaded archive into the cache directory
///
/// Only the regular file whose path is exactly `{os}-{arch}/helm` is extracted. It is written to a
/// temporary file next to its destination and renamed into place, so a concurrent reader never
/// sees a partially written binary. The archive is removed on every exit path.
pub fn extract(config: &Config, version: &str) -> Result<PathBuf> {
  let archive_path = config.archive_path(version);
  let _cleanup = RemoveOnDrop(&archive_path);

  let file = File::open(&archive_path)?;
  let malformed = |source| Error::Archive {
    path: archive_path.to_owned(),
    source,
  };

  let expected = config.platform.archive_entry();
  let mut archive = Archive::new(GzDecoder::new(file));
  for entry in archive.entries().map_err(malformed)? {
    let mut entry = entry.map_err(malformed)?;
    if !entry.header().entry_type().is_file() {
      continue;
    }
    if &*entry.path_bytes() != expected.as_bytes() {
      continue;
    }

    let binary = config.binary_path(version);
    let mut staged = tempfile::Builder::new()
      .prefix(&format!(".helm-{version}."))
      .tempfile_in(&config.cache_dir)?;
    io::copy(&mut entry, staged.as_file_mut()).map_err(malformed)?;
    staged.as_file().set_permissions(Permissions::from_mode(0o755))?;
    staged.persist(&binary).map_err(|err| err.error)?;

    debug!("Extracted {expected} to {}", binary.display());
    return Ok(binary);
  }

  Err(Error::EntryNotFound {
    version: version.to_owned(),
    entry: expected,
  })
}

#[cfg(test)]
mod tests {
  use std::{fs, os::unix::fs::PermissionsExt};

  use super::*;
  use crate::{cache, testing};

  fn setup(archive: &[u8]) -> (tempfile::TempDir, Config) {
    let tmp = tempfile::tempdir().unwrap();
    let config = testing::config(tmp.path(), String::new());
    cache::ensure_dir(&config.cache_dir).unwrap();
    fs::write(config.archive_path("v2.16.7"), archive).unwrap();
    (tmp, config)
  }

  fn cache_entries(config: &Config) -> Vec<String> {
    fs::read_dir(&config.cache_dir)
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
      .collect()
  }

  #[test]
  fn it_extracts_only_the_helm_binary() {
    let platform = crate::platform::Platform::current().unwrap();
    let (_tmp, config) = setup(&testing::release(&platform, "echo helm"));

    let binary = extract(&config, "v2.16.7").unwrap();

    assert_eq!(binary, config.binary_path("v2.16.7"));
    assert_eq!(fs::read_to_string(&binary).unwrap(), "#!/bin/sh\necho helm\n");
    assert_eq!(fs::metadata(&binary).unwrap().permissions().mode() & 0o777, 0o755);
    assert!(cache::is_installed(&binary).unwrap());
    assert_eq!(cache_entries(&config), vec!["helm-v2.16.7".to_owned()]);
    assert!(!config.archive_path("v2.16.7").exists());

    let run = crate::utils::cmd_exec(&mut std::process::Command::new(&binary)).unwrap();
    assert_eq!(run.stdout, "helm\n");
  }

  #[test]
  fn it_fails_when_entry_is_missing() {
    let entry = format!("{}-{}/kubectl", config_platform().os, config_platform().arch);
    let (_tmp, config) = setup(&testing::tarball(&[(entry.as_str(), b"kubectl")]));

    let err = extract(&config, "v2.16.7").unwrap_err();

    assert!(matches!(err, Error::EntryNotFound { .. }));
    assert!(!cache::is_installed(config.binary_path("v2.16.7")).unwrap());
    assert!(cache_entries(&config).is_empty());
    assert!(!config.archive_path("v2.16.7").exists());
  }

  #[test]
  fn it_requires_exact_entry_path() {
    let platform = config_platform();
    let entry = format!("dist/{}", platform.archive_entry());
    let (_tmp, config) = setup(&testing::tarball(&[(entry.as_str(), b"helm")]));

    let err = extract(&config, "v2.16.7").unwrap_err();

    assert!(matches!(err, Error::EntryNotFound { .. }));
  }

  #[test]
  fn it_rejects_corrupt_archives() {
    let (_tmp, config) = setup(b"this is not gzip");

    let err = extract(&config, "v2.16.7").unwrap_err();

    assert!(matches!(err, Error::Archive { .. }));
    assert!(cache_entries(&config).is_empty());
    assert!(!config.archive_path("v2.16.7").exists());
  }

  #[test]
  fn it_fails_without_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let config = testing::config(tmp.path(), String::new());

    let err = extract(&config, "v2.16.7").unwrap_err();

    assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
  }

  fn config_platform() -> crate::platform::Platform {
    crate::platform::Platform::current().unwrap()
  }
}
