use crate::error::ClientError;
use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that injects an API key as an HTTP header.
///
/// `header_name` is the header field to set and `value` the raw value written
/// into it. The value is marked sensitive so it never shows up in debug output.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    value: HeaderValue,
}

impl<C> ApiKey<C> {
    pub fn new(inner: C, header_name: &str, key: &str) -> Result<Self, ClientError> {
        let header_name =
            HeaderName::from_bytes(header_name.as_bytes()).map_err(|_| ClientError::InvalidToken)?;
        let mut value = HeaderValue::from_str(key).map_err(|_| ClientError::InvalidToken)?;
        value.set_sensitive(true);
        Ok(Self {
            inner,
            header_name,
            value,
        })
    }

    /// Convenience constructor that uses `Authorization: Bearer <token>`, the
    /// scheme the Transition API expects.
    pub fn bearer(inner: C, token: &str) -> Result<Self, ClientError> {
        if token.is_empty() {
            return Err(ClientError::InvalidToken);
        }
        Self::new(inner, AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}
