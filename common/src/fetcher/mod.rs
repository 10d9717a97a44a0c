//! Fetching remote resources

mod data;
pub use data::*;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, ClientBuilder, IntoUrl, Method};
use std::time::Duration;
use url::Url;

/// Fetch data using HTTP.
///
/// Sits on top of an HTTP client and adds a per-request timeout plus a bounded
/// number of retries with exponential backoff.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: Client,
    retries: usize,
}

/// Error when retrieving
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Options for the [`Fetcher`]
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct FetcherOptions {
    pub timeout: Duration,
    pub retries: usize,
}

impl FetcherOptions {
    /// Create a new instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: impl Into<Duration>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Set the number of retries.
    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 5,
        }
    }
}

impl From<Client> for Fetcher {
    fn from(client: Client) -> Self {
        Self::with_client(client, FetcherOptions::default())
    }
}

impl Fetcher {
    /// Create a new fetcher from options.
    pub async fn new(options: FetcherOptions) -> anyhow::Result<Self> {
        let client = ClientBuilder::new().timeout(options.timeout);

        Ok(Self::with_client(client.build()?, options))
    }

    /// Create a fetcher providing an existing client.
    fn with_client(client: Client, options: FetcherOptions) -> Self {
        Self {
            client,
            retries: options.retries,
        }
    }

    /// Fetch data, using a GET request.
    ///
    /// The kind of data extracted from the response is controlled by the
    /// [`Data`] instance; wrap it in [`Option`] to have a `404 Not Found` or an
    /// empty body reported as [`None`] instead of an error.
    pub async fn fetch<D: Data>(&self, url: impl IntoUrl) -> Result<D, Error> {
        // if the URL building fails, there is no need to re-try, abort now.
        let url = url.into_url()?;
        log::debug!("Fetching: {url}");

        let backoff = ExponentialBuilder::default();

        (|| async {
            match self.fetch_once(url.clone()).await {
                Ok(result) => Ok(result),
                Err(err) => {
                    log::info!("Failed to retrieve {url}: {err}");
                    Err(err)
                }
            }
        })
        .retry(&backoff.with_max_times(self.retries))
        .await
    }

    async fn fetch_once<D: Data>(&self, url: Url) -> Result<D, Error> {
        let response = self.client.request(Method::GET, url).send().await?;

        D::from_response(response).await
    }
}
