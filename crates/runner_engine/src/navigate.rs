use std::fmt;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::StreamExt;

#[derive(Debug, Clone)]
pub struct NavigateSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    /// Body bytes read before the load counts as complete.
    pub max_body_bytes: u64,
}

impl Default for NavigateSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

/// A completed full page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLoad {
    pub requested: String,
    /// Address the page ended up at after redirects.
    pub address: String,
    pub status: u16,
    pub redirect_count: usize,
    pub body_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct NavigateError {
    pub kind: NavigateFailure,
    pub message: String,
}

impl NavigateError {
    pub(crate) fn new(kind: NavigateFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigateFailure {
    InvalidUrl,
    Timeout,
    RedirectLimitExceeded,
    Network,
}

impl fmt::Display for NavigateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigateFailure::InvalidUrl => write!(f, "invalid url"),
            NavigateFailure::Timeout => write!(f, "timeout"),
            NavigateFailure::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            NavigateFailure::Network => write!(f, "network error"),
        }
    }
}

#[async_trait::async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<PageLoad, NavigateError>;
}

/// Loads pages over HTTP. Any response, including error statuses, is a load;
/// only transport failures are errors.
#[derive(Debug, Clone)]
pub struct ReqwestNavigator {
    settings: NavigateSettings,
}

impl ReqwestNavigator {
    pub fn new(settings: NavigateSettings) -> Self {
        Self { settings }
    }

    fn build_client(
        &self,
        redirect_counter: Arc<AtomicUsize>,
    ) -> Result<reqwest::Client, NavigateError> {
        let redirect_limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            redirect_counter.store(count, Ordering::Relaxed);
            if count >= redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(policy)
            .build()
            .map_err(|err| NavigateError::new(NavigateFailure::Network, err.to_string()))
    }
}

#[async_trait::async_trait]
impl Navigator for ReqwestNavigator {
    async fn navigate(&self, url: &str) -> Result<PageLoad, NavigateError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| NavigateError::new(NavigateFailure::InvalidUrl, err.to_string()))?;
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = self.build_client(redirect_counter.clone())?;

        let response = client.get(parsed).send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let address = response.url().to_string();

        let mut body_bytes = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            body_bytes += chunk.len() as u64;
            if body_bytes >= self.settings.max_body_bytes {
                break;
            }
        }

        Ok(PageLoad {
            requested: url.to_string(),
            address,
            status,
            redirect_count: redirect_counter.load(Ordering::Relaxed),
            body_bytes,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> NavigateError {
    if err.is_timeout() {
        return NavigateError::new(NavigateFailure::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return NavigateError::new(NavigateFailure::RedirectLimitExceeded, err.to_string());
    }
    NavigateError::new(NavigateFailure::Network, err.to_string())
}
