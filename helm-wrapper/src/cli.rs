use std::path::PathBuf;

use clap::{builder::BoolishValueParser, ArgAction, Parser};

use crate::probe::ProbeErrorPolicy;

/// Default Helm release launched when the cluster does not ask for another one
pub const DEFAULT_HELM_VERSION: &str = "v2.16.7";

/// Release artifact location, `{version}`, `{os}` and `{arch}` are substituted
pub const DEFAULT_DOWNLOAD_URL: &str = "https://get.helm.sh/helm-{version}-{os}-{arch}.tar.gz";

/// Settings of the wrapper itself
///
/// Every command line argument belongs to Helm, so these values are only ever read from the
/// environment (see [`Cli::from_env`]). The `long` names exist so that clap can render them in
/// error messages.
#[derive(Debug, Parser)]
#[command(author, about, version)]
pub struct Cli {
  /// Directory holding the downloaded Helm binaries (default: ~/.helm-wrapper/bin)
  #[arg(long, env = "HELM_WRAPPER_CACHE_DIR")]
  pub cache_dir: Option<PathBuf>,

  /// Directory where release archives are downloaded before extraction (default: system temp dir)
  #[arg(long, env = "HELM_WRAPPER_TMP_DIR")]
  pub tmp_dir: Option<PathBuf>,

  /// Helm version used when no Tiller is found in the cluster
  #[arg(long, env = "HELM_WRAPPER_DEFAULT_VERSION", default_value = DEFAULT_HELM_VERSION)]
  pub default_version: String,

  /// Template of the release archive URL
  #[arg(long, env = "HELM_WRAPPER_DOWNLOAD_URL", default_value = DEFAULT_DOWNLOAD_URL)]
  pub download_url: String,

  /// Timeout in seconds for downloading a release archive
  #[arg(long, env = "HELM_WRAPPER_DOWNLOAD_TIMEOUT", default_value_t = 120)]
  pub download_timeout: u64,

  /// Kubeconfig used to look for Tiller (default: ~/.kube/config)
  #[arg(long, env = "HELM_WRAPPER_KUBECONFIG")]
  pub kubeconfig: Option<PathBuf>,

  /// Namespace searched for Tiller pods
  #[arg(long, env = "HELM_WRAPPER_TILLER_NAMESPACE", default_value = "kube-system")]
  pub tiller_namespace: String,

  /// Label selector matching Tiller pods
  #[arg(long, env = "HELM_WRAPPER_TILLER_SELECTOR", default_value = "app=helm,name=tiller")]
  pub tiller_selector: String,

  /// Timeout in seconds for the cluster query, credential plugins included
  #[arg(long, env = "HELM_WRAPPER_PROBE_TIMEOUT", default_value_t = 10)]
  pub probe_timeout: u64,

  /// What to do when the cluster cannot be queried
  #[arg(long, env = "HELM_WRAPPER_ON_PROBE_ERROR", value_enum, default_value_t)]
  pub on_probe_error: ProbeErrorPolicy,

  /// Do not query the cluster, always launch the default version
  #[arg(
    long,
    env = "HELM_WRAPPER_SKIP_PROBE",
    action = ArgAction::Set,
    value_parser = BoolishValueParser::new(),
    default_value = "false"
  )]
  pub skip_probe: bool,

  /// Log filter directive, e.g. `debug` or `helm_wrapper=trace`
  #[arg(long, env = "HELM_WRAPPER_LOG", default_value = "warn")]
  pub log: String,
}

impl Cli {
  /// Read the settings from the environment, ignoring the process arguments
  pub fn from_env() -> Result<Self, clap::Error> {
    Self::try_parse_from([env!("CARGO_PKG_NAME")])
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn it_applies_defaults() {
    let cli = Cli::try_parse_from(["helm-wrapper"]).unwrap();

    assert_eq!(cli.default_version, DEFAULT_HELM_VERSION);
    assert_eq!(cli.download_url, DEFAULT_DOWNLOAD_URL);
    assert_eq!(cli.download_timeout, 120);
    assert_eq!(cli.tiller_namespace, "kube-system");
    assert_eq!(cli.tiller_selector, "app=helm,name=tiller");
    assert_eq!(cli.on_probe_error, ProbeErrorPolicy::Fallback);
    assert!(!cli.skip_probe);
  }

  #[test]
  fn it_parses_probe_policy() {
    let cli = Cli::try_parse_from(["helm-wrapper", "--on-probe-error", "fail", "--skip-probe", "yes"]).unwrap();

    assert_eq!(cli.on_probe_error, ProbeErrorPolicy::Fail);
    assert!(cli.skip_probe);
  }

  #[test]
  fn it_rejects_unknown_policy() {
    assert!(Cli::try_parse_from(["helm-wrapper", "--on-probe-error", "ignore"]).is_err());
  }
}
