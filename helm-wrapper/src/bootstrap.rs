use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
  archive,
  cache::{self, InstallLock},
  config::Config,
  download::Fetcher,
  probe::TillerProbe,
  version,
};

/// Makes the Helm binary to launch available in the cache directory
pub struct Bootstrap<P> {
  config: Config,
  fetcher: Fetcher,
  probe: P,
}

impl<P: TillerProbe> Bootstrap<P> {
  pub fn new(config: Config, probe: P) -> Result<Self> {
    let fetcher = Fetcher::new(&config).context("creating HTTP client")?;

    Ok(Bootstrap { config, fetcher, probe })
  }

  /// Make sure `version` is in the cache, downloading and extracting it when it is not
  ///
  /// Installs of the same version by concurrent processes are serialized, the loser of the race
  /// finds the binary in place once it holds the lock.
  pub async fn install(&self, version: &str) -> Result<PathBuf> {
    let binary = self.config.binary_path(version);
    let installed = || {
      cache::is_installed(&binary).with_context(|| format!("checking for {}", binary.display()))
    };

    if installed()? {
      debug!("Helm {version} found at {}", binary.display());
      return Ok(binary);
    }

    let _lock = InstallLock::acquire(&self.config.cache_dir, version)
      .await
      .with_context(|| format!("locking install of helm {version}"))?;
    if installed()? {
      debug!("Helm {version} installed by another process");
      return Ok(binary);
    }

    self
      .fetcher
      .fetch(&self.config, version)
      .await
      .with_context(|| format!("downloading helm {version}"))?;
    let binary =
      archive::extract(&self.config, version).with_context(|| format!("extracting helm {version}"))?;
    info!("Installed helm {version} to {}", binary.display());

    Ok(binary)
  }

  /// Install the default version, work out the effective version and install that one as well
  ///
  /// Returns the path of the binary to launch.
  pub async fn resolve(&self) -> Result<PathBuf> {
    let cache_dir = &self.config.cache_dir;
    cache::ensure_dir(cache_dir).with_context(|| format!("creating {}", cache_dir.display()))?;

    let default_version = &self.config.default_version;
    let default_binary = self.install(default_version).await?;

    let effective = version::effective_version(&self.config, &self.probe, &default_binary)
      .await
      .context("determining the helm version of the cluster")?;
    if &effective == default_version {
      return Ok(default_binary);
    }

    info!("Cluster requires helm {effective} instead of {default_version}");
    self.install(&effective).await
  }
}
