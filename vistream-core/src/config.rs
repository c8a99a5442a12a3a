use crate::error::{CoreError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VistreamConfig {
    #[serde(default)]
    pub loading_bar: LoadingBarConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub carousel: CarouselConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Probe-specific sections, keyed by probe name (e.g. `[probe.http]`)
    #[serde(default)]
    pub probe: ProbesConfig,
}

/// Timing of the simulated loading-bar ramp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadingBarConfig {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Upper bound (exclusive) of the random increment added per tick
    #[serde(default = "default_max_increment")]
    pub max_increment: f64,
    /// Ticks never push progress past this value
    #[serde(default = "default_soft_ceiling")]
    pub soft_ceiling: f64,
    #[serde(default = "default_complete_min")]
    pub complete_min_ms: u64,
    #[serde(default = "default_complete_max")]
    pub complete_max_ms: u64,
    #[serde(default = "default_settle")]
    pub settle_ms: u64,
}

const fn default_tick_interval() -> u64 {
    100
}

const fn default_max_increment() -> f64 {
    30.0
}

const fn default_soft_ceiling() -> f64 {
    90.0
}

const fn default_complete_min() -> u64 {
    300
}

const fn default_complete_max() -> u64 {
    500
}

const fn default_settle() -> u64 {
    200
}

impl Default for LoadingBarConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            max_increment: default_max_increment(),
            soft_ceiling: default_soft_ceiling(),
            complete_min_ms: default_complete_min(),
            complete_max_ms: default_complete_max(),
            settle_ms: default_settle(),
        }
    }
}

impl LoadingBarConfig {
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Delay between showing the bar and swapping the route
    #[serde(default = "default_pre_navigate_delay")]
    pub pre_navigate_delay_ms: u64,
}

const fn default_pre_navigate_delay() -> u64 {
    50
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            pre_navigate_delay_ms: default_pre_navigate_delay(),
        }
    }
}

impl NavigationConfig {
    #[must_use]
    pub const fn pre_navigate_delay(&self) -> Duration {
        Duration::from_millis(self.pre_navigate_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Candidate path prefixes, probed in order
    #[serde(default = "default_source_prefixes")]
    pub source_prefixes: Vec<String>,
    /// Delay before a probed source is handed to the media element
    #[serde(default = "default_assign_delay")]
    pub assign_delay_ms: u64,
    /// Delay between clearing the source and reassigning it on retry
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_buffering_floor")]
    pub buffering_floor: f64,
    #[serde(default = "default_volume")]
    pub default_volume: f64,
}

fn default_source_prefixes() -> Vec<String> {
    vec![
        "/videos/".to_string(),
        "./videos/".to_string(),
        "../videos/".to_string(),
    ]
}

const fn default_assign_delay() -> u64 {
    100
}

const fn default_retry_delay() -> u64 {
    100
}

const fn default_buffering_floor() -> f64 {
    40.0
}

const fn default_volume() -> f64 {
    0.5
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            source_prefixes: default_source_prefixes(),
            assign_delay_ms: default_assign_delay(),
            retry_delay_ms: default_retry_delay(),
            buffering_floor: default_buffering_floor(),
            default_volume: default_volume(),
        }
    }
}

impl PlaybackConfig {
    #[must_use]
    pub const fn assign_delay(&self) -> Duration {
        Duration::from_millis(self.assign_delay_ms)
    }

    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarouselConfig {
    #[serde(default = "default_auto_advance")]
    pub auto_advance_ms: u64,
    /// Minimum wheel delta that counts as a deliberate scroll
    #[serde(default = "default_scroll_threshold")]
    pub scroll_threshold: f64,
    #[serde(default = "default_scroll_lock")]
    pub scroll_lock_ms: u64,
    #[serde(default = "default_trailer_fade")]
    pub trailer_fade_ms: u64,
}

const fn default_auto_advance() -> u64 {
    8000
}

const fn default_scroll_threshold() -> f64 {
    50.0
}

const fn default_scroll_lock() -> u64 {
    1000
}

const fn default_trailer_fade() -> u64 {
    300
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            auto_advance_ms: default_auto_advance(),
            scroll_threshold: default_scroll_threshold(),
            scroll_lock_ms: default_scroll_lock(),
            trailer_fade_ms: default_trailer_fade(),
        }
    }
}

impl CarouselConfig {
    #[must_use]
    pub const fn auto_advance(&self) -> Duration {
        Duration::from_millis(self.auto_advance_ms)
    }

    #[must_use]
    pub const fn scroll_lock(&self) -> Duration {
        Duration::from_millis(self.scroll_lock_ms)
    }

    #[must_use]
    pub const fn trailer_fade(&self) -> Duration {
        Duration::from_millis(self.trailer_fade_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to a file in the cache directory
    #[serde(default)]
    pub enabled: bool,
}

/// Dynamic probe configuration.
///
/// Each probe crate owns the shape of its own section and extracts it with
/// [`ProbesConfig::get`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbesConfig(toml::Table);

impl ProbesConfig {
    /// Deserialize the section for the named probe, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the section exists but does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.0
            .get(name)
            .cloned()
            .map(toml::Value::try_into)
            .transpose()
            .map_err(CoreError::from)
    }
}

impl VistreamConfig {
    /// Get the configuration directory path (~/.config/vistream/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/vistream/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default path, or create a template on first run.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing the template, or an
    /// error if the file cannot be read, parsed or validated.
    pub fn load_or_create(probe_templates: Option<&[&str]>) -> Result<Self> {
        Self::load_or_create_at(&Self::config_path(), probe_templates)
    }

    /// Load config from `config_path`, or create a template there.
    ///
    /// # Errors
    ///
    /// See [`VistreamConfig::load_or_create`].
    pub fn load_or_create_at(config_path: &Path, probe_templates: Option<&[&str]>) -> Result<Self> {
        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(config_path, build_config_template(probe_templates))?;

            return Err(CoreError::ConfigNotFound {
                path: config_path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(config_path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a config document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let bar = &self.loading_bar;
        if bar.tick_interval_ms == 0 {
            return Err(invalid("loading_bar.tick_interval_ms must be positive"));
        }
        if !bar.max_increment.is_finite() || bar.max_increment < 0.0 {
            return Err(invalid("loading_bar.max_increment must be a non-negative number"));
        }
        if !(0.0..=100.0).contains(&bar.soft_ceiling) {
            return Err(invalid("loading_bar.soft_ceiling must be within 0..=100"));
        }
        if bar.complete_min_ms > bar.complete_max_ms {
            return Err(invalid(
                "loading_bar.complete_min_ms must not exceed loading_bar.complete_max_ms",
            ));
        }

        let playback = &self.playback;
        if playback.source_prefixes.is_empty() {
            return Err(invalid("playback.source_prefixes must not be empty"));
        }
        if !(0.0..=100.0).contains(&playback.buffering_floor) {
            return Err(invalid("playback.buffering_floor must be within 0..=100"));
        }
        if !(0.0..=1.0).contains(&playback.default_volume) {
            return Err(invalid("playback.default_volume must be within 0.0..=1.0"));
        }

        if self.carousel.auto_advance_ms == 0 {
            return Err(invalid("carousel.auto_advance_ms must be positive"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> CoreError {
    CoreError::ConfigInvalid {
        message: message.to_string(),
    }
}

/// Build the config file template, appending any probe-specific sections.
#[must_use]
pub fn build_config_template(probe_templates: Option<&[&str]>) -> String {
    let mut template = CONFIG_TEMPLATE.to_string();
    for fragment in probe_templates.unwrap_or_default() {
        template.push('\n');
        template.push_str(fragment);
    }
    template
}

const CONFIG_TEMPLATE: &str = r#"# Vistream Configuration
# ~/.config/vistream/config.toml

[loading_bar]
# Simulated progress ramp shown on every route change
tick_interval_ms = 100
max_increment = 30.0
soft_ceiling = 90.0
# Completion fires after a random delay in [complete_min_ms, complete_max_ms)
complete_min_ms = 300
complete_max_ms = 500
# Pause at 100% before the bar hides
settle_ms = 200

[navigation]
pre_navigate_delay_ms = 50

[playback]
# Probed in order; the first reachable path wins
source_prefixes = ["/videos/", "./videos/", "../videos/"]
assign_delay_ms = 100
retry_delay_ms = 100
buffering_floor = 40.0
default_volume = 0.5

[carousel]
auto_advance_ms = 8000
scroll_threshold = 50.0
scroll_lock_ms = 1000
trailer_fade_ms = 300

[logging]
# Write logs to the cache directory in addition to the console
enabled = false
"#;
