//! Page-title fetcher: GET a page and pull out its `<title>`.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::engine::Operation;

use super::FetchError;
use super::http::HttpClient;

const OPEN: &str = "<title>";
const CLOSE: &str = "</title>";

/// Text between the first `<title>` and the `</title>` after it, trimmed.
pub fn extract_title(body: &str) -> Result<String, FetchError> {
    let start = body.find(OPEN).ok_or(FetchError::MissingTag(OPEN))? + OPEN.len();
    let len = body[start..]
        .find(CLOSE)
        .ok_or(FetchError::MissingTag(CLOSE))?;
    Ok(body[start..start + len].trim().to_string())
}

/// Operation mapping a URL to its page title.
#[derive(Debug, Clone)]
pub struct TitleFetcher {
    client: HttpClient,
}

impl TitleFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

impl Operation<String> for TitleFetcher {
    type Output = String;
    type Error = FetchError;

    fn call(
        &self,
        url: String,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<String, FetchError>> + Send {
        let client = self.client.clone();
        async move {
            let response = client.get(&url, &cancel).await?;
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                text = response.text() => text?,
            };
            extract_title(&body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_trimmed() {
        let body = "<html><head><title>\n  Example Domain \n</title></head></html>";
        assert_eq!(extract_title(body).unwrap(), "Example Domain");
    }

    #[test]
    fn missing_open_tag() {
        let err = extract_title("<html><body>hi</body></html>").unwrap_err();
        assert!(matches!(err, FetchError::MissingTag("<title>")));
    }

    #[test]
    fn missing_close_tag() {
        let err = extract_title("<title>unterminated").unwrap_err();
        assert!(matches!(err, FetchError::MissingTag("</title>")));
    }

    #[test]
    fn first_title_wins() {
        let body = "<title>one</title><title>two</title>";
        assert_eq!(extract_title(body).unwrap(), "one");
    }
}
