//! HTTP plumbing shared by the API clients.

mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use reqwest::Request;
use tracing::debug;

use crate::error::ClientError;

/// Executes `req` and returns the body text of a successful response.
///
/// # Errors
///
/// Any non-2xx status becomes [`ClientError::Http`] carrying the status and
/// the response body.
pub async fn fetch_text<C: HttpClient + ?Sized>(
    client: &C,
    req: Request,
) -> Result<String, ClientError> {
    let method = req.method().clone();
    let url = req.url().path().to_string();

    let resp = client.execute(req).await?;
    let status = resp.status();
    let body = resp.text().await?;
    debug!(%method, path = %url, %status, bytes = body.len(), "Response received");

    if !status.is_success() {
        return Err(ClientError::Http { status, body });
    }
    Ok(body)
}
