use std::{path::Path, process::Command};

use tracing::{debug, info, warn};

use crate::{
  config::Config,
  error::{Error, Result},
  probe::{ProbeErrorPolicy, TillerProbe},
  utils,
};

/// Template asking Helm 2 for the version of the Tiller it talks to
const SERVER_VERSION_TEMPLATE: &str = "{{.Server.SemVer}}";

/// Decide which Helm version to launch
///
/// When Tiller runs in the cluster, the client must match its version, which the already installed
/// default client reports. Otherwise the default version is used. A failing probe is handled
/// according to [`ProbeErrorPolicy`].
pub async fn effective_version<P: TillerProbe>(config: &Config, probe: &P, default_binary: &Path) -> Result<String> {
  if !config.probe.enabled {
    debug!("Cluster probe disabled, using helm {}", config.default_version);
    return Ok(config.default_version.to_owned());
  }

  let present = match probe.tiller_present().await {
    Ok(present) => present,
    Err(err) => match config.probe.on_error {
      ProbeErrorPolicy::Fallback => {
        warn!("Unable to query the cluster for Tiller, assuming it is absent: {err}");
        false
      }
      ProbeErrorPolicy::Fail => return Err(err),
    },
  };

  if !present {
    return Ok(config.default_version.to_owned());
  }

  let server = server_version(default_binary)?;
  info!("Tiller reports version {server}");
  Ok(server)
}

/// Ask the Helm client at `binary` for the Tiller version it is connected to
pub fn server_version(binary: &Path) -> Result<String> {
  let mut cmd = Command::new(binary);
  cmd.args(["version", "--server", "--template", SERVER_VERSION_TEMPLATE]);

  let output = utils::cmd_exec(&mut cmd)?;
  if !output.success() {
    return Err(Error::Subprocess {
      command: utils::describe(&cmd),
      status: output.status,
      output: format!("{}{}", output.stdout, output.stderr).trim().to_owned(),
    });
  }

  let version = output.stdout.trim();
  utils::get_semver(version)?;

  Ok(version.to_owned())
}
