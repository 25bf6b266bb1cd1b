use crate::error::{PgkitError, Result};
use std::io::Read;
use std::time::Duration;

/// An opened response body whose headers have arrived but whose payload has
/// not been read yet.
pub struct HttpBody {
    pub content_length: Option<u64>,
    pub reader: Box<dyn Read + Send>,
}

/// Network access used by the resolver and the downloader.
pub trait HttpTransport {
    /// GET `url` and return the whole body as text.
    fn fetch_text(&self, url: &str) -> Result<String>;

    /// GET `url` and return the body unread, for streaming.
    fn open(&self, url: &str) -> Result<HttpBody>;
}

pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self> {
        // No overall timeout: archive bodies can take minutes to stream.
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .timeout(None)
            .build()?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| PgkitError::network(url, e.to_string()))?;

        check_status(url, response.status())?;
        Ok(response)
    }
}

/// Anything but a 2xx answer is a network failure for `url`.
pub(crate) fn check_status(url: &str, status: reqwest::StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(PgkitError::network(url, format!("HTTP status {status}")))
    }
}

impl HttpTransport for ReqwestTransport {
    fn fetch_text(&self, url: &str) -> Result<String> {
        tracing::debug!("Fetching {url}");
        self.get(url)?
            .text()
            .map_err(|e| PgkitError::network(url, e.to_string()))
    }

    fn open(&self, url: &str) -> Result<HttpBody> {
        tracing::debug!("Opening download stream for {url}");
        let response = self.get(url)?;
        Ok(HttpBody {
            content_length: response.content_length(),
            reader: Box::new(response),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeTransport, Route};
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reqwest_transport_builds() {
        assert!(ReqwestTransport::new("pgkit-test", Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_unreachable_host_is_network_error() {
        let transport = FakeTransport::new();
        let err = transport.fetch_text("https://nowhere.invalid/").unwrap_err();
        assert!(matches!(err, PgkitError::Network { .. }));
    }

    #[test]
    fn test_non_success_status_is_network_error() {
        let url = "https://vendor.example/missing.zip";
        let err = check_status(url, reqwest::StatusCode::NOT_FOUND).unwrap_err();
        assert_eq!(
            err.to_string(),
            PgkitError::network(url, "HTTP status 404 Not Found").to_string()
        );
        assert!(check_status(url, reqwest::StatusCode::OK).is_ok());
    }

    #[test]
    fn test_status_route_fails_both_requests() {
        let url = "https://vendor.example/missing.zip";
        let transport = FakeTransport::new().route(url, Route::Status(404));

        assert!(matches!(
            transport.open(url),
            Err(PgkitError::Network { message, .. }) if message.contains("404")
        ));
        assert!(transport.fetch_text(url).unwrap_err().is_download_failure());
    }
}
