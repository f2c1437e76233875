use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

/// Failures raised while preparing or launching a Helm binary
#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Io(#[from] io::Error),

  #[error(transparent)]
  Regex(#[from] regex_lite::Error),

  #[error("request to {url} failed: {source}")]
  Network {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  /// The download endpoint answered with something other than 200 OK
  #[error("couldn't download helm {version}: {status:?}")]
  UnexpectedStatus { version: String, status: String },

  /// The gzip stream or the tar container is malformed
  #[error("malformed archive {}: {source}", path.display())]
  Archive {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The archive was readable but did not contain the Helm binary
  #[error("archive for helm {version} has no regular file entry {entry}")]
  EntryNotFound { version: String, entry: String },

  #[error("unable to execute {command}: {source}")]
  Spawn {
    command: String,
    #[source]
    source: io::Error,
  },

  #[error("{command} exited with status {status}: {output}")]
  Subprocess {
    command: String,
    status: i32,
    output: String,
  },

  /// The server version reported by Helm is not a semantic version
  #[error("unexpected server version output {0:?}")]
  UnexpectedOutput(String),

  #[error("invalid kubeconfig {}: {reason}", path.display())]
  Kubeconfig { path: PathBuf, reason: String },

  /// Resolving credentials and listing pods did not finish in time
  #[error("cluster query did not complete within {0:?}")]
  ProbeTimeout(Duration),

  #[error("cluster API responded {status} when listing pods in namespace {namespace}")]
  ClusterStatus { namespace: String, status: String },

  #[error("unsupported platform {os}/{arch}")]
  UnsupportedPlatform { os: String, arch: String },

  #[error("unable to determine the user home directory")]
  HomeDirNotFound,
}

pub type Result<T> = std::result::Result<T, Error>;
