pub mod archive;
pub mod bootstrap;
pub mod cache;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod kubeconfig;
pub mod launch;
pub mod platform;
pub mod probe;
pub mod utils;
pub mod version;

#[cfg(test)]
mod testing;

use std::{ffi::OsString, io};

use anyhow::{Context, Result};
pub use bootstrap::Bootstrap;
pub use cli::Cli;
pub use config::Config;
pub use error::Error;
use probe::KubeProbe;

/// Resolve the Helm binary for the current cluster, run it with `args` and relay its output
///
/// Returns the exit code of the launched binary.
pub async fn run(cli: &Cli, args: &[OsString]) -> Result<i32> {
  let config = Config::from_cli(cli).context("resolving configuration")?;
  let probe = KubeProbe::new(config.probe.clone());
  let bootstrap = Bootstrap::new(config, probe)?;

  let binary = bootstrap.resolve().await?;
  let launched = launch::launch(&binary, args).with_context(|| format!("launching {}", binary.display()))?;

  launch::relay(&launched, &mut io::stdout().lock(), &mut io::stderr().lock()).context("relaying helm output")
}
