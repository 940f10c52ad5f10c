use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to build http client: {0}")]
    Client(String),
    #[error("invalid asset url: {0}")]
    Url(#[from] url::ParseError),
    #[error("request to {url} failed: {reason}")]
    Transport { url: Url, reason: String },
    #[error("{url} answered with status {status}")]
    Status { url: Url, status: u16 },
    #[error("failed writing {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where stem audio is downloaded from
#[async_trait]
pub trait AssetFetcher: Send + Sync + Debug {
    /// Download `url` into a newly created `destination`, returning the
    ///  number of body bytes written. The caller owns cleanup of
    ///  `destination` when this fails.
    async fn fetch(&self, url: &Url, destination: &Path) -> Result<u64, FetchError>;
}

/// Location of a stem's audio on the asset host
pub fn asset_url(host: &str, key: &str) -> Result<Url, FetchError> {
    Ok(Url::parse(&format!("https://{}/{}", host, key))?)
}

/// Fetches over https. Certificates are not verified, the asset host is
///  commonly a local object store with a self-signed certificate.
#[derive(Debug, Clone)]
pub struct HttpAssetFetcher {
    client: Client,
}

impl HttpAssetFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, url: &Url, destination: &Path) -> Result<u64, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.clone(),
            reason: e.to_string(),
        };
        let io = |source: std::io::Error| FetchError::Io {
            path: destination.to_path_buf(),
            source,
        };

        let mut response = self.client.get(url.clone()).send().await.map_err(transport)?;
        if response.status() != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.clone(),
                status: response.status().as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(destination).await.map_err(io)?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(transport)? {
            file.write_all(&chunk).await.map_err(io)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io)?;

        tracing::trace!(url = %url, bytes = written, "asset downloaded");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_url() {
        let url = asset_url("cdn.example:9000", "attachments/oggAudio/abc").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example:9000/attachments/oggAudio/abc");
    }
}
