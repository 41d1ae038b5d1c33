use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the VOD linker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upload time estimation settings
    pub estimation: EstimationConfig,

    /// Video linking settings
    pub linking: LinkingConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    /// Maximum distance between a title date and a session start (hours)
    pub date_margin_hours: f64,

    /// Duration difference still counted as a close match (seconds)
    pub duration_margin_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkingConfig {
    /// Allowed duration difference between source and target (seconds)
    pub margin_sec: f64,

    /// Targets this short or shorter never match on duration alone (seconds)
    pub min_duration: f64,

    /// Allowed distance between target estimate and source upload (hours)
    pub date_margin_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            date_margin_hours: 48.0,
            duration_margin_seconds: 20.0,
        }
    }
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            margin_sec: 2.0,
            min_duration: 300.0,
            date_margin_hours: 48.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from the first readable config file, then apply
    /// `VOD_LINKER_*` environment overrides. Falls back to defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "vod-linker.toml",
            "config/vod-linker.toml",
            "/etc/vod-linker/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config.apply_env_with(|key| std::env::var(key).ok());
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from an explicit file, with environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env_with(|key| std::env::var(key).ok());
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_with(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let number = |key: &str, current: f64| match lookup(key).map(|v| v.parse::<f64>()) {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                tracing::warn!("Ignoring {}: {}", key, e);
                current
            }
            None => current,
        };

        self.estimation.date_margin_hours = number("VOD_LINKER_DATE_MARGIN_HOURS", self.estimation.date_margin_hours);
        self.estimation.duration_margin_seconds = number(
            "VOD_LINKER_DURATION_MARGIN_SECONDS",
            self.estimation.duration_margin_seconds,
        );
        self.linking.margin_sec = number("VOD_LINKER_MARGIN_SEC", self.linking.margin_sec);
        self.linking.min_duration = number("VOD_LINKER_MIN_DURATION", self.linking.min_duration);
        self.linking.date_margin_hours = number("VOD_LINKER_LINK_DATE_MARGIN_HOURS", self.linking.date_margin_hours);

        if let Some(level) = lookup("VOD_LINKER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("VOD_LINKER_LOG_JSON") {
            self.logging.json = matches!(json.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let margins = [
            ("estimation.date_margin_hours", self.estimation.date_margin_hours),
            ("estimation.duration_margin_seconds", self.estimation.duration_margin_seconds),
            ("linking.margin_sec", self.linking.margin_sec),
            ("linking.min_duration", self.linking.min_duration),
            ("linking.date_margin_hours", self.linking.date_margin_hours),
        ];
        for (name, value) in margins {
            if !value.is_finite() || value < 0.0 {
                return Err(anyhow!("{} must be a non-negative number, got {}", name, value));
            }
        }

        if self.logging.level.trim().is_empty() {
            return Err(anyhow!("logging.level must not be empty"));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "VOD Linker Configuration:\n\
            - Estimation date margin: {}h\n\
            - Estimation duration margin: {}s\n\
            - Linking duration margin: {}s\n\
            - Linking minimum duration: {}s\n\
            - Linking date margin: {}h\n\
            - Log level: {}{}",
            self.estimation.date_margin_hours,
            self.estimation.duration_margin_seconds,
            self.linking.margin_sec,
            self.linking.min_duration,
            self.linking.date_margin_hours,
            self.logging.level,
            if self.logging.json { " (json)" } else { "" }
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_estimation_date_margin_hours(mut self, hours: f64) -> Self {
        self.config.estimation.date_margin_hours = hours;
        self
    }

    pub fn with_duration_margin_seconds(mut self, seconds: f64) -> Self {
        self.config.estimation.duration_margin_seconds = seconds;
        self
    }

    pub fn with_margin_sec(mut self, seconds: f64) -> Self {
        self.config.linking.margin_sec = seconds;
        self
    }

    pub fn with_min_duration(mut self, seconds: f64) -> Self {
        self.config.linking.min_duration = seconds;
        self
    }

    pub fn with_link_date_margin_hours(mut self, hours: f64) -> Self {
        self.config.linking.date_margin_hours = hours;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn json_logs(mut self, enable: bool) -> Self {
        self.config.logging.json = enable;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
