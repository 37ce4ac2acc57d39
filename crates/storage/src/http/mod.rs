use std::env;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::repository::{AttemptRepository, QuestionRepository, Storage, StorageError};

mod attempt_repo;
mod question_repo;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    /// `None` disables the per-request timeout.
    pub timeout: Option<Duration>,
}

impl BackendConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }

    /// Read `QUIZ_API_URL` and `QUIZ_API_TIMEOUT_SECS`.
    ///
    /// A timeout of `0` disables it; unparsable values fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = env::var("QUIZ_API_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let timeout = env::var("QUIZ_API_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::new(base_url).with_timeout_secs(timeout)
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StorageError::Serialization(err.to_string())
        } else {
            StorageError::Connection(err.to_string())
        }
    }
}

/// REST client for the quiz backend.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Build a client for `config`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> Result<Self, StorageError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.config.url(path))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.config.url(path))
    }

    fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.config.url(path))
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.config.url(path))
    }

    async fn send(request: RequestBuilder) -> Result<Response, StorageError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), %status, "backend response");
        match status {
            s if s.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound),
            StatusCode::CONFLICT => Err(StorageError::Conflict),
            other => Err(StorageError::Status(other.as_u16())),
        }
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, StorageError> {
        Ok(Self::send(request).await?.json().await?)
    }
}

impl Storage {
    /// Repositories backed by the REST backend.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the HTTP client cannot be built.
    pub fn http(config: BackendConfig) -> Result<Self, StorageError> {
        let backend = HttpBackend::new(config)?;
        let questions: Arc<dyn QuestionRepository> = Arc::new(backend.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(backend);
        Ok(Self {
            questions,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let config = BackendConfig::new("http://quiz.local:5000/");
        assert_eq!(
            config.url("/api/questions/sets"),
            "http://quiz.local:5000/api/questions/sets"
        );
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config = BackendConfig::default().with_timeout_secs(0);
        assert_eq!(config.timeout, None);

        let config = config.with_timeout_secs(3);
        assert_eq!(config.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn default_points_at_local_backend() {
        let config = BackendConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_connection_error() {
        let backend =
            HttpBackend::new(BackendConfig::new("http://127.0.0.1:1").with_timeout_secs(2))
                .unwrap();
        let err = backend.list_sets().await.unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
    }
}
