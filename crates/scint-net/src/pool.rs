use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use futures::Stream;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request")]
    Request(#[from] reqwest::Error),
}

/// One connection pool per install run, not per
/// gem. Protected by lazy creation so it's only ever built once the first
/// download actually needs it.
#[derive(Debug, Clone)]
pub struct DownloadPool {
    client: Arc<OnceLock<reqwest::Client>>,
}

impl Default for DownloadPool {
    fn default() -> Self {
        Self {
            client: Arc::new(OnceLock::new()),
        }
    }
}

impl DownloadPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> &reqwest::Client {
        self.client.get_or_init(|| {
            reqwest::ClientBuilder::new()
                .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("build reqwest client")
        })
    }

    /// Fetches `url` and streams the response body.
    pub async fn stream(&self, url: Url) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>>, Error> {
        let response = self.client().get(url).send().await?;
        Ok(response.error_for_status()?.bytes_stream())
    }

    /// Fetches `url` fully into memory (used for the compact-index client
    /// and small metadata fetches).
    pub async fn bytes(&self, url: Url) -> Result<Bytes, Error> {
        let response = self.client().get(url).send().await?;
        Ok(response.error_for_status()?.bytes().await?)
    }
}
