//! HTTP client shared by upstream fetchers and icon downloads

use std::time::Duration;

use crate::error::{RepoError, Result};

const USER_AGENT: &str = concat!("chartkeeper/", env!("CARGO_PKG_VERSION"));
const TIMEOUT_SECS: u64 = 30;

/// A fetched response body
#[derive(Debug, Clone)]
pub struct Fetched {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// Thin wrapper around `reqwest::Client` that turns non-success statuses into errors
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| RepoError::NetworkError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    /// GET a URL, failing on any status of 300 or above
    pub async fn get(&self, url: &str) -> Result<Fetched> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::HttpError {
                status: status.as_u16(),
                message: format!("request to {} returned {}", url, status),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = response.bytes().await?.to_vec();

        Ok(Fetched { data, content_type })
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.get(url).await?.data)
    }

    /// GET a URL and decode its JSON body
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let data = self.get_bytes(url).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}
