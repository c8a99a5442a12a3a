mod config;

pub use config::{CONFIG_TEMPLATE as HTTP_PROBE_CONFIG_TEMPLATE, HttpProbeConfig, PROBE_NAME};

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use vistream_core::{CoreError, SourceProbe};

/// Checks candidate video paths with `HEAD` requests
pub struct HttpSourceProbe {
    client: ClientWithMiddleware,
    base_url: Url,
}

impl HttpSourceProbe {
    /// Create a probe from its config section.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be created.
    pub fn new(config: &HttpProbeConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let base_url = Url::parse(config.base_url.trim())?;

        // Base client with timeout
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(5)))
            .user_agent(concat!("Vistream/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Wrap with retry middleware (exponential backoff)
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client, base_url })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a candidate path against the base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the joined URL is invalid.
    pub fn resolve(&self, path: &str) -> Result<Url, CoreError> {
        Ok(self.base_url.join(&encode_path(path))?)
    }
}

/// Percent-encode every segment of `path`, leaving `.` and `..` intact
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment {
            "" | "." | ".." => segment.into(),
            _ => urlencoding::encode(segment),
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl SourceProbe for HttpSourceProbe {
    fn name(&self) -> &'static str {
        PROBE_NAME
    }

    async fn exists(&self, path: &str) -> Result<bool, CoreError> {
        let url = self.resolve(path)?;
        debug!("HEAD {}", url);

        let response = self.client.head(url.clone()).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(true);
        }
        if status.is_server_error() {
            warn!("HEAD {} returned status: {}", url, status);
            return Err(CoreError::ProbeFailed {
                probe: self.name().to_string(),
                path: path.to_string(),
                reason: format!("server returned status: {status}"),
            });
        }

        debug!("HEAD {} returned status: {}", url, status);
        Ok(false)
    }
}
