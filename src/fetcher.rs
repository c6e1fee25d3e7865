use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use tracing::{debug, info};

use crate::config::FetchConfig;
use crate::error::{Error, Result};

const HTML_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

/// Retrieves the raw HTML of a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::network("<client>", e))?;

        Ok(Self { client })
    }

    pub fn is_html_content_type(content_type: &str) -> bool {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim();
        HTML_CONTENT_TYPES
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        info!("Fetching page: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::network(url, format!("HTTP status {}", status)));
        }

        // A missing header is tolerated; a declared non-HTML body is not.
        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            if !Self::is_html_content_type(content_type) {
                return Err(Error::Parse(format!(
                    "expected HTML from {}, got {}",
                    url, content_type
                )));
            }
        }

        let body = response.text().await.map_err(|e| Error::network(url, e))?;
        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
