//! HTTP transport seam.
//!
//! The poller machinery never talks to the network itself; the runtime
//! performs the request described by `HttpRequest` and feeds the body (or
//! error text) back through `SharedPoller::handle_reply`. Production uses
//! the reqwest client; tests feed replies directly.

use std::future::Future;
use std::pin::Pin;

/// One request the poller wants issued. At most one is outstanding per
/// poller at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
}

pub type FetchResult = Result<Vec<u8>, String>;

pub trait Transport {
    fn fetch(
        &self,
        request: HttpRequest,
        auth: Option<(String, String)>,
    ) -> Pin<Box<dyn Future<Output = FetchResult> + Send>>;
}

/// reqwest-backed transport with JSON accept headers.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ReqwestTransport {
    fn fetch(
        &self,
        request: HttpRequest,
        auth: Option<(String, String)>,
    ) -> Pin<Box<dyn Future<Output = FetchResult> + Send>> {
        let client = self.client.clone();
        Box::pin(async move {
            let mut builder = client
                .get(&request.url)
                .header("Accept", "application/json")
                .header("Content-Type", "application/json");
            if let Some((user, password)) = auth {
                builder = builder.basic_auth(user, Some(password));
            }
            let response = builder.send().await.map_err(|e| e.to_string())?;
            if !response.status().is_success() {
                return Err(format!("HTTP status {}", response.status()));
            }
            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| e.to_string())
        })
    }
}
