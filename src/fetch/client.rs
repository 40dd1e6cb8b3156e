use async_trait::async_trait;
use reqwest::{Request, Response};

/// Sends a prepared request. Implemented by the plain client and by the
/// authentication wrappers around it.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
