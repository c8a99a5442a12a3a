//! HTTP probe configuration.

use const_format::concatcp;
use serde::{Deserialize, Serialize};
use vistream_core::{CoreError, ProbesConfig};

/// Probe name used in config file
pub const PROBE_NAME: &str = "http";

/// Page URL candidate paths are resolved against
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/";

/// HTTP probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProbeConfig {
    /// URL of the page the player is mounted on
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Retries for transient failures (connection errors, 5xx)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

const fn default_timeout() -> u64 {
    5
}

const fn default_max_retries() -> u32 {
    2
}

impl Default for HttpProbeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl HttpProbeConfig {
    /// Extract the HTTP probe config from the dynamic probe sections.
    ///
    /// # Errors
    ///
    /// Returns an error if the section cannot be parsed.
    pub fn from_probes(probes: &ProbesConfig) -> Result<Option<Self>, CoreError> {
        probes.get(PROBE_NAME)
    }

    /// # Errors
    ///
    /// Returns an error if the base URL is empty or the timeout is zero.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.base_url.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "probe.http.base_url must not be empty".into(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "probe.http.timeout_secs must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Config template for the HTTP probe.
/// This is appended to the base config template when creating a new config file.
pub const CONFIG_TEMPLATE: &str = concatcp!(
    r#"[probe.http]
# Candidate video paths are checked with HEAD requests resolved against this URL
base_url = ""#,
    DEFAULT_BASE_URL,
    r#""
timeout_secs = 5
max_retries = 2
"#
);

#[cfg(test)]
mod tests {
    use super::*;
    use vistream_core::{build_config_template, VistreamConfig};

    #[test]
    fn test_template_parses_to_defaults() {
        let template = build_config_template(Some(&[CONFIG_TEMPLATE]));
        let config = VistreamConfig::from_toml_str(&template).unwrap();
        let probe = HttpProbeConfig::from_probes(&config.probe).unwrap().unwrap();

        assert_eq!(probe.base_url, DEFAULT_BASE_URL);
        assert_eq!(probe.timeout_secs, 5);
        assert_eq!(probe.max_retries, 2);
    }

    #[test]
    fn test_missing_section() {
        let config = VistreamConfig::from_toml_str("").unwrap();
        assert!(HttpProbeConfig::from_probes(&config.probe).unwrap().is_none());
    }

    #[test]
    fn test_validate() {
        let config = HttpProbeConfig {
            timeout_secs: 0,
            ..HttpProbeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CoreError::ConfigInvalid { .. })
        ));
        assert!(HttpProbeConfig::default().validate().is_ok());
    }
}
