use std::{
  collections::BTreeMap,
  fs::{self, File},
  io::BufReader,
  path::{Path, PathBuf},
};

use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::{
  error::{Error, Result},
  utils,
};

/// The subset of a kubeconfig file needed to reach the API server of the current context
///
/// https://kubernetes.io/docs/reference/config-api/kubeconfig.v1/
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
  /// Clusters defined in the kubeconfig
  #[serde(default)]
  clusters: Vec<NamedCluster>,

  /// Contexts binds names to cluster/user/namespaces tuples
  #[serde(default)]
  contexts: Vec<NamedContext>,

  /// CurrentContext is the name of the default context
  #[serde(default)]
  current_context: Option<String>,

  /// Users defined in the kubeconfig
  #[serde(default)]
  users: Vec<NamedAuthInfo>,

  /// File the configuration was read from, relative paths inside it resolve against its directory
  #[serde(skip)]
  path: PathBuf,
}

/// NamedCluster relates nicknames to cluster information
#[derive(Debug, Deserialize)]
struct NamedCluster {
  name: String,
  cluster: Cluster,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Cluster {
  /// Server is the address of the kubernetes cluster (https://hostname:port)
  server: String,

  /// InsecureSkipTLSVerify skips the validity check for the server's certificate
  #[serde(default)]
  insecure_skip_tls_verify: bool,

  /// CertificateAuthority is the path to a cert file for the certificate authority
  certificate_authority: Option<PathBuf>,

  /// CertificateAuthorityData contains base64 PEM-encoded certificate authority certificates.
  /// Overrides CertificateAuthority
  certificate_authority_data: Option<String>,

  /// ProxyURL is the URL to the proxy to be used for all requests made by this client
  proxy_url: Option<String>,
}

/// NamedContext relates nicknames to context information
#[derive(Debug, Deserialize)]
struct NamedContext {
  name: String,
  context: Context,
}

#[derive(Debug, Deserialize)]
struct Context {
  cluster: String,
  user: Option<String>,
}

/// NamedAuthInfo relates nicknames to auth information
#[derive(Debug, Deserialize)]
struct NamedAuthInfo {
  name: String,
  #[serde(default)]
  user: AuthInfo,
}

/// AuthInfo contains information that describes identity information
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AuthInfo {
  client_certificate: Option<PathBuf>,
  client_certificate_data: Option<String>,
  client_key: Option<PathBuf>,
  client_key_data: Option<String>,
  token: Option<String>,
  token_file: Option<PathBuf>,
  username: Option<String>,
  password: Option<String>,
  auth_provider: Option<AuthProviderConfig>,
  exec: Option<ExecConfig>,
}

/// AuthProviderConfig holds the configuration of a legacy auth provider (gcp, oidc, ...)
#[derive(Debug, Deserialize)]
struct AuthProviderConfig {
  name: String,
  #[serde(default)]
  config: BTreeMap<String, String>,
}

/// ExecConfig specifies a command to provide client credentials
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecConfig {
  command: String,
  #[serde(default)]
  args: Vec<String>,
  #[serde(default)]
  env: Vec<EnvVar>,
  api_version: Option<String>,
  install_hint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvVar {
  name: String,
  value: String,
}

/// ExecCredential printed by an exec plugin on stdout
#[derive(Debug, Deserialize)]
struct ExecCredential {
  #[serde(default)]
  status: ExecCredentialStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecCredentialStatus {
  token: Option<String>,
  client_certificate_data: Option<String>,
  client_key_data: Option<String>,
}

/// How requests to the API server authenticate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
  Anonymous,
  Bearer(String),
  Basic { username: String, password: Option<String> },
}

/// Everything required to open a connection to the API server of the current context
#[derive(Debug, Clone)]
pub struct ClusterAccess {
  pub server: String,
  pub insecure_skip_tls_verify: bool,
  pub proxy_url: Option<String>,
  /// PEM encoded CA bundle
  pub ca_pem: Option<Vec<u8>>,
  /// PEM encoded client certificate followed by its private key
  pub identity_pem: Option<Vec<u8>>,
  pub credentials: Credentials,
}

impl KubeConfig {
  pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut conf: KubeConfig = serde_yaml::from_reader(reader).map_err(|err| Error::Kubeconfig {
      path: path.to_owned(),
      reason: err.to_string(),
    })?;
    conf.path = path.to_owned();

    Ok(conf)
  }

  fn invalid(&self, reason: impl Into<String>) -> Error {
    Error::Kubeconfig {
      path: self.path.to_owned(),
      reason: reason.into(),
    }
  }

  /// Relative paths in a kubeconfig are relative to the file itself
  fn resolve_path(&self, path: &Path) -> PathBuf {
    match self.path.parent() {
      Some(dir) if path.is_relative() => dir.join(path),
      _ => path.to_owned(),
    }
  }

  fn decode(&self, field: &str, data: &str) -> Result<Vec<u8>> {
    general_purpose::STANDARD
      .decode(data.trim())
      .map_err(|err| self.invalid(format!("{field} is not valid base64: {err}")))
  }

  /// Inline data wins over the referenced file
  fn data_or_file(&self, field: &str, data: &Option<String>, file: &Option<PathBuf>) -> Result<Option<Vec<u8>>> {
    if let Some(data) = data {
      return Ok(Some(self.decode(field, data)?));
    }
    match file {
      Some(file) => Ok(Some(fs::read(self.resolve_path(file))?)),
      None => Ok(None),
    }
  }

  /// Resolve the cluster and credentials of the current context
  ///
  /// Exec credential plugins run without a deadline here, callers bound the whole resolution.
  pub async fn current_cluster(&self) -> Result<ClusterAccess> {
    let context_name = self
      .current_context
      .as_deref()
      .filter(|name| !name.is_empty())
      .ok_or_else(|| self.invalid("current-context is not set"))?;

    let context = self
      .contexts
      .iter()
      .find(|c| c.name == context_name)
      .map(|c| &c.context)
      .ok_or_else(|| self.invalid(format!("context {context_name} not found")))?;

    let cluster = self
      .clusters
      .iter()
      .find(|c| c.name == context.cluster)
      .map(|c| &c.cluster)
      .ok_or_else(|| self.invalid(format!("cluster {} not found", context.cluster)))?;

    let default_user = AuthInfo::default();
    let user = match &context.user {
      Some(name) => self
        .users
        .iter()
        .find(|u| &u.name == name)
        .map(|u| &u.user)
        .ok_or_else(|| self.invalid(format!("user {name} not found")))?,
      None => &default_user,
    };
    debug!("Using kubeconfig context {context_name} with server {}", cluster.server);

    let ca_pem = self.data_or_file(
      "certificate-authority-data",
      &cluster.certificate_authority_data,
      &cluster.certificate_authority,
    )?;

    let cert = self.data_or_file("client-certificate-data", &user.client_certificate_data, &user.client_certificate)?;
    let key = self.data_or_file("client-key-data", &user.client_key_data, &user.client_key)?;
    let mut identity_pem = match (cert, key) {
      (Some(mut cert), Some(key)) => {
        cert.push(b'\n');
        cert.extend(key);
        Some(cert)
      }
      (None, None) => None,
      _ => return Err(self.invalid("client certificate and client key must be set together")),
    };

    let credentials = match (&user.token, &user.token_file, &user.auth_provider, &user.exec) {
      (Some(token), _, _, _) => Credentials::Bearer(token.to_owned()),
      (None, Some(file), _, _) => Credentials::Bearer(fs::read_to_string(self.resolve_path(file))?.trim().to_owned()),
      (None, None, Some(provider), _) => self.auth_provider_token(provider)?,
      (None, None, None, Some(exec)) => {
        let status = self.exec_credential(exec).await?;
        if let (Some(cert), Some(key)) = (&status.client_certificate_data, &status.client_key_data) {
          identity_pem = Some(format!("{cert}\n{key}").into_bytes());
        }
        match status.token {
          Some(token) => Credentials::Bearer(token),
          None => Credentials::Anonymous,
        }
      }
      (None, None, None, None) => match &user.username {
        Some(username) => Credentials::Basic {
          username: username.to_owned(),
          password: user.password.to_owned(),
        },
        None => Credentials::Anonymous,
      },
    };

    Ok(ClusterAccess {
      server: cluster.server.trim_end_matches('/').to_owned(),
      insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
      proxy_url: cluster.proxy_url.to_owned(),
      ca_pem,
      identity_pem,
      credentials,
    })
  }

  /// Legacy auth providers cache their token in the kubeconfig itself
  fn auth_provider_token(&self, provider: &AuthProviderConfig) -> Result<Credentials> {
    ["access-token", "id-token"]
      .iter()
      .find_map(|key| provider.config.get(*key))
      .map(|token| Credentials::Bearer(token.to_owned()))
      .ok_or_else(|| self.invalid(format!("auth provider {} has no cached token", provider.name)))
  }

  /// Run an exec credential plugin and parse the ExecCredential it prints
  async fn exec_credential(&self, exec: &ExecConfig) -> Result<ExecCredentialStatus> {
    let command = if exec.command.contains('/') {
      self.resolve_path(Path::new(&exec.command))
    } else {
      PathBuf::from(&exec.command)
    };
    let api_version = exec
      .api_version
      .as_deref()
      .unwrap_or("client.authentication.k8s.io/v1beta1");
    let exec_info = serde_json::json!({
      "apiVersion": api_version,
      "kind": "ExecCredential",
      "spec": { "interactive": false },
    });

    let mut cmd = Command::new(command);
    cmd
      .args(&exec.args)
      .envs(exec.env.iter().map(|e| (&e.name, &e.value)))
      .env("KUBERNETES_EXEC_INFO", exec_info.to_string())
      .kill_on_drop(true);

    let output = cmd.output().await.map_err(|source| {
      let err = Error::Spawn {
        command: utils::describe(cmd.as_std()),
        source,
      };
      match &exec.install_hint {
        Some(hint) => self.invalid(format!("{err}\n{hint}")),
        None => err,
      }
    })?;
    if !output.status.success() {
      return Err(Error::Subprocess {
        command: utils::describe(cmd.as_std()),
        status: output.status.code().unwrap_or(1),
        output: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
      });
    }

    let credential: ExecCredential = serde_json::from_slice(&output.stdout)
      .map_err(|err| self.invalid(format!("exec plugin {} returned invalid output: {err}", exec.command)))?;

    Ok(credential.status)
  }
}
