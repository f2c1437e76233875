//! Fixtures shared by the unit tests

use std::{path::Path, time::Duration};

use flate2::{write::GzEncoder, Compression};
use tar::{Builder, EntryType, Header};

use crate::{
  config::{Config, DownloadConfig, ProbeConfig},
  platform::Platform,
  probe::ProbeErrorPolicy,
};

/// Configuration rooted in a scratch directory with the probe disabled
pub fn config(root: &Path, url_template: String) -> Config {
  std::fs::create_dir_all(root.join("tmp")).unwrap();

  Config {
    cache_dir: root.join("bin"),
    tmp_dir: root.join("tmp"),
    platform: Platform::current().unwrap(),
    default_version: "v2.16.7".to_owned(),
    download: DownloadConfig {
      url_template,
      timeout: Duration::from_secs(5),
    },
    probe: ProbeConfig {
      enabled: false,
      kubeconfig: root.join("kubeconfig"),
      namespace: "kube-system".to_owned(),
      label_selector: "app=helm,name=tiller".to_owned(),
      timeout: Duration::from_secs(5),
      on_error: ProbeErrorPolicy::Fallback,
    },
  }
}

/// Gzipped tarball holding `entries`, regular files with mode 0644
pub fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
  let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

  for (path, content) in entries {
    let mut header = Header::new_gnu();
    header.set_path(path).unwrap();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append(&header, *content).unwrap();
  }

  builder.into_inner().unwrap().finish().unwrap()
}

/// Tarball shaped like a Helm release whose `helm` runs `script` with `/bin/sh`
pub fn release(platform: &Platform, script: &str) -> Vec<u8> {
  let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

  let mut dir = Header::new_gnu();
  dir.set_path(format!("{}-{}/", platform.os, platform.arch)).unwrap();
  dir.set_entry_type(EntryType::Directory);
  dir.set_size(0);
  dir.set_mode(0o755);
  dir.set_cksum();
  builder.append(&dir, std::io::empty()).unwrap();

  let script = format!("#!/bin/sh\n{script}\n");
  for (name, content) in [
    ("LICENSE", "Apache License".as_bytes()),
    ("README.md", "Helm".as_bytes()),
    ("helm", script.as_bytes()),
  ] {
    let mut header = Header::new_gnu();
    header.set_path(format!("{}-{}/{name}", platform.os, platform.arch)).unwrap();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append(&header, content).unwrap();
  }

  builder.into_inner().unwrap().finish().unwrap()
}
