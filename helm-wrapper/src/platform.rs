use std::{env, fmt};

use crate::error::{Error, Result};

/// Operating system and architecture, spelled the way Helm names its release artifacts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Platform {
  pub os: String,
  pub arch: String,
}

impl Platform {
  pub fn new(os: &str, arch: &str) -> Self {
    Self {
      os: os.to_owned(),
      arch: arch.to_owned(),
    }
  }

  /// Platform of the running process
  pub fn current() -> Result<Self> {
    Self::from_rust(env::consts::OS, env::consts::ARCH)
  }

  /// Translate Rust target names into the Go `GOOS`/`GOARCH` names used in release URLs
  pub fn from_rust(os: &str, arch: &str) -> Result<Self> {
    let goos = match os {
      "linux" => "linux",
      "macos" => "darwin",
      "windows" => "windows",
      _ => return Err(unsupported(os, arch)),
    };

    let goarch = match arch {
      "x86_64" => "amd64",
      "x86" => "386",
      "aarch64" => "arm64",
      "arm" => "arm",
      "powerpc64" => "ppc64le",
      "s390x" => "s390x",
      _ => return Err(unsupported(os, arch)),
    };

    Ok(Self::new(goos, goarch))
  }

  /// Path of the Helm binary inside the release tarball
  pub fn archive_entry(&self) -> String {
    format!("{}-{}/helm", self.os, self.arch)
  }
}

fn unsupported(os: &str, arch: &str) -> Error {
  Error::UnsupportedPlatform {
    os: os.to_owned(),
    arch: arch.to_owned(),
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.os, self.arch)
  }
}
