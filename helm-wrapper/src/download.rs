use std::path::PathBuf;

use reqwest::{Client, StatusCode};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, info};

use crate::{
  config::Config,
  error::{Error, Result},
};

/// Downloads Helm release archives into the temporary directory
#[derive(Clone, Debug)]
pub struct Fetcher {
  client: Client,
}

impl Fetcher {
  pub fn new(config: &Config) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.download.timeout)
      .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|source| Error::Network {
        url: config.download.url_template.to_owned(),
        source,
      })?;

    Ok(Fetcher { client })
  }

  /// Stream the release archive for `version` to [`Config::archive_path`]
  ///
  /// The archive is left on disk for [`crate::archive::extract`], which removes it.
  pub async fn fetch(&self, config: &Config, version: &str) -> Result<PathBuf> {
    let url = config.download_url(version);
    info!("Downloading helm {version} from {url}");

    let network = |source| Error::Network {
      url: url.to_owned(),
      source,
    };

    let mut response = self.client.get(&url).send().await.map_err(network)?;
    let status = response.status();
    if status != StatusCode::OK {
      return Err(Error::UnexpectedStatus {
        version: version.to_owned(),
        status: status.to_string(),
      });
    }

    let path = config.archive_path(version);
    let mut file = File::create(&path).await?;
    let mut written = 0;
    while let Some(chunk) = response.chunk().await.map_err(network)? {
      file.write_all(&chunk).await?;
      written += chunk.len();
    }
    file.flush().await?;

    debug!("Wrote {written} bytes to {}", path.display());
    Ok(path)
  }
}
