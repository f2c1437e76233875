use std::{env, path::PathBuf, time::Duration};

use crate::{
  cli::Cli,
  error::{Error, Result},
  platform::Platform,
  probe::ProbeErrorPolicy,
};

/// Everything the bootstrap steps need to know, resolved once up front
#[derive(Clone, Debug)]
pub struct Config {
  /// Directory holding `helm-{version}` binaries
  pub cache_dir: PathBuf,
  /// Directory receiving `helm-{version}.tar.gz` while it is being extracted
  pub tmp_dir: PathBuf,
  pub platform: Platform,
  pub default_version: String,
  pub download: DownloadConfig,
  pub probe: ProbeConfig,
}

#[derive(Clone, Debug)]
pub struct DownloadConfig {
  pub url_template: String,
  pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct ProbeConfig {
  pub enabled: bool,
  pub kubeconfig: PathBuf,
  pub namespace: String,
  pub label_selector: String,
  pub timeout: Duration,
  pub on_error: ProbeErrorPolicy,
}

impl Config {
  pub fn from_cli(cli: &Cli) -> Result<Self> {
    let cache_dir = match &cli.cache_dir {
      Some(dir) => dir.to_owned(),
      None => home_dir()?.join(".helm-wrapper").join("bin"),
    };

    let kubeconfig = match &cli.kubeconfig {
      Some(path) => path.to_owned(),
      None => home_dir()?.join(".kube").join("config"),
    };

    Ok(Config {
      cache_dir,
      tmp_dir: cli.tmp_dir.to_owned().unwrap_or_else(env::temp_dir),
      platform: Platform::current()?,
      default_version: cli.default_version.to_owned(),
      download: DownloadConfig {
        url_template: cli.download_url.to_owned(),
        timeout: Duration::from_secs(cli.download_timeout),
      },
      probe: ProbeConfig {
        enabled: !cli.skip_probe,
        kubeconfig,
        namespace: cli.tiller_namespace.to_owned(),
        label_selector: cli.tiller_selector.to_owned(),
        timeout: Duration::from_secs(cli.probe_timeout),
        on_error: cli.on_probe_error,
      },
    })
  }

  /// Path of the cached binary for `version`
  pub fn binary_path(&self, version: &str) -> PathBuf {
    self.cache_dir.join(format!("helm-{version}"))
  }

  /// Path of the downloaded release archive for `version`
  pub fn archive_path(&self, version: &str) -> PathBuf {
    self.tmp_dir.join(format!("helm-{version}.tar.gz"))
  }

  /// Release archive URL for `version` on the configured platform
  pub fn download_url(&self, version: &str) -> String {
    self
      .download
      .url_template
      .replace("{version}", version)
      .replace("{os}", &self.platform.os)
      .replace("{arch}", &self.platform.arch)
  }
}

fn home_dir() -> Result<PathBuf> {
  dirs::home_dir().ok_or(Error::HomeDirNotFound)
}
