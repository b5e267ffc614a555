//! HTTP client abstraction for snapshot providers

use std::time::Duration;

use reqwest::header::CONTENT_LENGTH;

use super::error::ProviderError;

/// Minimal HTTP surface the providers and the URL validator need.
///
/// Implementations block the calling thread until a response or a transport
/// error arrives.
pub trait HttpClient: Send + Sync {
    /// GET `url` and return the body.
    fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError>;

    /// HEAD `url` and return the advertised `Content-Length`, if any.
    fn content_length(&self, url: &str) -> Result<Option<u64>, ProviderError>;
}

/// Blocking client on top of reqwest.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Client without a request timeout; a slow provider only delays the step.
    pub fn new() -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .user_agent(concat!("baking-setup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ProviderError::Http(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| ProviderError::Http(format!("Failed to read response: {}", e)))
    }

    fn content_length(&self, url: &str) -> Result<Option<u64>, ProviderError> {
        let response = self
            .client
            .head(url)
            .send()
            .map_err(|e| ProviderError::Http(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok()))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory client answering from a fixed URL table
    #[derive(Default)]
    pub struct MockHttpClient {
        pub bodies: HashMap<String, Vec<u8>>,
        pub lengths: HashMap<String, u64>,
    }

    impl MockHttpClient {
        pub fn with_body(mut self, url: &str, body: &str) -> Self {
            self.bodies.insert(url.to_string(), body.as_bytes().to_vec());
            self
        }

        pub fn with_length(mut self, url: &str, length: u64) -> Self {
            self.lengths.insert(url.to_string(), length);
            self
        }
    }

    impl HttpClient for MockHttpClient {
        fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
            self.bodies.get(url).cloned().ok_or(ProviderError::Status {
                status: 404,
                url: url.to_string(),
            })
        }

        fn content_length(&self, url: &str) -> Result<Option<u64>, ProviderError> {
            match (self.lengths.get(url), self.bodies.get(url)) {
                (Some(len), _) => Ok(Some(*len)),
                (None, Some(body)) => Ok(Some(body.len() as u64)),
                (None, None) => Err(ProviderError::Status {
                    status: 404,
                    url: url.to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_mock_client_routes() {
        let mock = MockHttpClient::default().with_body("http://a/catalog.json", "[]");
        assert_eq!(mock.get("http://a/catalog.json").unwrap(), b"[]".to_vec());
        assert_eq!(mock.content_length("http://a/catalog.json").unwrap(), Some(2));
        assert!(matches!(
            mock.get("http://a/missing"),
            Err(ProviderError::Status { status: 404, .. })
        ));
    }
}
