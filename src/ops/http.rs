//! Shared HTTP client handle.
//!
//! Built once by the caller and cloned into each operation; there is no
//! process-wide client.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::secrets::bearer;

use super::FetchError;

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    auth: Option<HeaderValue>,
}

impl HttpClient {
    /// Build a client. `token`, when set, is sent as a bearer token.
    ///
    /// A token that cannot form a header value is rejected here.
    pub fn new(token: Option<SecretString>) -> Result<Self, FetchError> {
        let auth = token.as_ref().map(bearer).transpose()?;
        let inner = reqwest::Client::builder()
            .user_agent(concat!("fanout-rs/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { inner, auth })
    }

    /// GET `url`, giving up as soon as `cancel` fires.
    ///
    /// Non-success status codes are errors.
    pub async fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        let mut request = self.inner.get(parsed);
        if let Some(ref auth) = self.auth {
            request = request.header(AUTHORIZATION, auth.clone());
        }

        debug!(url, "GET");
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            sent = request.send() => sent?,
        };
        Ok(response.error_for_status()?)
    }
}
