//! HTTP access to the community rule registry.

use async_trait::async_trait;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::VERSION;

/// User agent string for registry requests.
fn user_agent() -> String {
    format!("pattern-warden/{} (rust)", VERSION)
}

/// Something that can fetch a registry document by URL.
#[async_trait]
pub trait RegistryFetcher: Send + Sync {
    /// Fetch the body at `url` as text.
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<String>;
}

/// Parameters for exponential backoff.
#[derive(Debug, Clone)]
pub struct BackoffParams {
    /// Initial delay in milliseconds
    pub initial_ms: u64,
    /// Multiplier for each retry
    pub mult: f64,
    /// Maximum delay in milliseconds
    pub max_ms: u64,
    /// Maximum number of tries, including the first
    pub max_tries: u32,
}

impl Default for BackoffParams {
    fn default() -> Self {
        Self {
            initial_ms: 250,
            mult: 2.0,
            max_ms: 2_000,
            max_tries: 3,
        }
    }
}

/// Retry `f` while it fails with a transient error.
pub async fn retry_with_backoff<F, Fut, T>(mut f: F, params: &BackoffParams) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff_ms = 0u64;
    let mut tries = 0u32;

    loop {
        match f().await {
            Ok(result) => {
                if tries > 0 {
                    debug!("Registry request succeeded after {} transient failures", tries);
                }
                return Ok(result);
            }
            Err(e) => {
                tries += 1;
                if tries >= params.max_tries || !e.is_transient() {
                    return Err(e);
                }

                backoff_ms = if backoff_ms == 0 {
                    params.initial_ms
                } else {
                    ((backoff_ms as f64) * params.mult).min(params.max_ms as f64) as u64
                };
                debug!(
                    "Registry request failed ({}), retrying in {} ms; retries = {}",
                    e, backoff_ms, tries
                );
                sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
    }
}

/// Registry client over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    client: Client,
    backoff: BackoffParams,
}

impl HttpRegistryClient {
    /// Create a client with a per-request deadline.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::from_client(client, BackoffParams::default()))
    }

    /// Wrap a preconfigured client.
    pub fn from_client(client: Client, backoff: BackoffParams) -> Self {
        Self { client, backoff }
    }

    async fn get_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::RegistryStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl RegistryFetcher for HttpRegistryClient {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<String> {
        debug!("Fetching {}", url);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = retry_with_backoff(|| self.get_once(url), &self.backoff) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_backoff() -> BackoffParams {
        BackoffParams {
            initial_ms: 1,
            mult: 2.0,
            max_ms: 5,
            max_tries: 3,
        }
    }

    fn client() -> HttpRegistryClient {
        let client = Client::builder().no_proxy().build().unwrap();
        HttpRegistryClient::from_client(client, fast_backoff())
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = retry_with_backoff(
            || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::RegistryStatus {
                    status: 404,
                    url: "u".to_string(),
                })
            },
            &fast_backoff(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_tries() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = retry_with_backoff(
            || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::RegistryStatus {
                    status: 503,
                    url: "u".to_string(),
                })
            },
            &fast_backoff(),
        )
        .await;

        assert!(matches!(result, Err(Error::RegistryStatus { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let base = serve(Router::new().route("/index.json", get(|| async { "{\"version\":1}" }))).await;

        let body = client()
            .fetch(&format!("{}/index.json", base), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, "{\"version\":1}");
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_status_error() {
        let base = serve(Router::new()).await;

        let err = client()
            .fetch(&format!("{}/missing.yml", base), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RegistryStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_retries_transient_failures() {
        let hits = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .route(
                "/index.json",
                get(|State(hits): State<Arc<AtomicU32>>| async move {
                    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                        (StatusCode::SERVICE_UNAVAILABLE, "busy")
                    } else {
                        (StatusCode::OK, "ok")
                    }
                }),
            )
            .with_state(hits.clone());
        let base = serve(router).await;

        let body = client()
            .fetch(&format!("{}/index.json", base), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client()
            .fetch("http://127.0.0.1:9/index.json", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
