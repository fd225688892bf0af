//! Upstream playlist fetching.
//!
//! Every playlist the stitcher reads (source, renditions, ad assets) goes
//! through [`Fetcher::text`]: one GET, no retry, non-2xx is an error. URLs
//! are checked by [`validate_origin_url`] first unless private origins are
//! explicitly allowed.

use crate::error::Result;
use crate::metrics;
use crate::server::url_validation::validate_origin_url;
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

/// Per-request timeout for upstream playlist fetches
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    allow_private_origins: bool,
}

impl Fetcher {
    pub fn new(client: Client, allow_private_origins: bool) -> Self {
        Self {
            client,
            allow_private_origins,
        }
    }

    /// GET `url` and return the body as text.
    ///
    /// # Errors
    ///
    /// [`crate::error::StitchError::InvalidOrigin`] when the URL fails origin
    /// validation, [`crate::error::StitchError::UpstreamFetch`] on network
    /// errors and non-2xx responses.
    pub async fn text(&self, url: &str) -> Result<String> {
        if !self.allow_private_origins {
            validate_origin_url(url)?;
        }

        let response = self
            .client
            .get(url)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .inspect_err(|e| {
                warn!("Upstream fetch failed for {}: {}", url, e);
                metrics::record_upstream_error();
            })?;

        if !response.status().is_success() {
            warn!("Upstream fetch returned {} for {}", response.status(), url);
            metrics::record_upstream_error();
        }

        Ok(response.error_for_status()?.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StitchError;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\n"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(Client::new(), true);
        let body = fetcher
            .text(&format!("{}/index.m3u8", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "#EXTM3U\n");
    }

    #[tokio::test]
    async fn server_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(Client::new(), true);
        let result = fetcher.text(&server.uri()).await;
        assert!(matches!(result, Err(StitchError::UpstreamFetch(_))));
    }

    #[tokio::test]
    async fn private_origin_rejected_unless_allowed() {
        let server = MockServer::start().await;
        let fetcher = Fetcher::new(Client::new(), false);

        let result = fetcher.text(&server.uri()).await;
        assert!(matches!(result, Err(StitchError::InvalidOrigin(_))));
    }
}
