use std::future::Future;

use clap::ValueEnum;
use reqwest::{Certificate, Client, Identity, Proxy};
use serde::Deserialize;
use tokio::time;
use tracing::{debug, info};

use crate::{
  config::ProbeConfig,
  error::{Error, Result},
  kubeconfig::{ClusterAccess, Credentials, KubeConfig},
};

/// What to do when the cluster cannot be queried for Tiller
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ProbeErrorPolicy {
  /// Treat the cluster as unreachable and launch the default version
  #[default]
  Fallback,
  /// Abort
  Fail,
}

/// Detects the legacy server-side component (Tiller) of Helm 2
///
/// Trait wrapper to support testing
pub trait TillerProbe {
  fn tiller_present(&self) -> impl Future<Output = Result<bool>>;
}

/// Looks for Tiller pods through the API server of the current kubeconfig context
#[derive(Debug)]
pub struct KubeProbe {
  config: ProbeConfig,
}

impl KubeProbe {
  pub fn new(config: ProbeConfig) -> Self {
    KubeProbe { config }
  }

  fn client(&self, access: &ClusterAccess) -> Result<Client> {
    let client_error = |source| Error::Network {
      url: access.server.to_owned(),
      source,
    };

    let mut builder = Client::builder().danger_accept_invalid_certs(access.insecure_skip_tls_verify);

    if let Some(ca) = &access.ca_pem {
      for cert in Certificate::from_pem_bundle(ca).map_err(client_error)? {
        builder = builder.add_root_certificate(cert);
      }
    }
    if let Some(identity) = &access.identity_pem {
      builder = builder.identity(Identity::from_pem(identity).map_err(client_error)?);
    }
    if let Some(proxy) = &access.proxy_url {
      builder = builder.proxy(Proxy::all(proxy).map_err(client_error)?);
    }

    builder.build().map_err(client_error)
  }
}

/// Only the number of returned pods matters
#[derive(Debug, Deserialize)]
struct PodList {
  #[serde(default)]
  items: Vec<serde_json::Value>,
}

impl TillerProbe for KubeProbe {
  /// Credential plugins and the API request share a single deadline
  async fn tiller_present(&self) -> Result<bool> {
    time::timeout(self.config.timeout, self.list_tiller_pods())
      .await
      .map_err(|_| Error::ProbeTimeout(self.config.timeout))?
  }
}

impl KubeProbe {
  async fn list_tiller_pods(&self) -> Result<bool> {
    let kubeconfig = KubeConfig::read(&self.config.kubeconfig)?;
    let access = kubeconfig.current_cluster().await?;
    let client = self.client(&access)?;

    let url = format!("{}/api/v1/namespaces/{}/pods", access.server, self.config.namespace);
    debug!("Listing pods at {url} with selector {}", self.config.label_selector);
    let network = |source| Error::Network {
      url: url.to_owned(),
      source,
    };

    let mut request = client
      .get(&url)
      .query(&[("labelSelector", self.config.label_selector.as_str()), ("limit", "1")]);
    request = match &access.credentials {
      Credentials::Anonymous => request,
      Credentials::Bearer(token) => request.bearer_auth(token),
      Credentials::Basic { username, password } => request.basic_auth(username, password.as_ref()),
    };

    let response = request.send().await.map_err(network)?;
    let status = response.status();
    if !status.is_success() {
      return Err(Error::ClusterStatus {
        namespace: self.config.namespace.to_owned(),
        status: status.to_string(),
      });
    }

    let pods: PodList = response.json().await.map_err(network)?;
    let present = !pods.items.is_empty();
    info!(
      "Tiller {} in namespace {}",
      if present { "found" } else { "not found" },
      self.config.namespace
    );

    Ok(present)
  }
}
