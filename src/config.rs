/*!
 * Configuration support for the performance engine
 *
 * Configuration is an explicit value handed to the engine. Nothing is read
 * from process-wide state during a computation.
 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::columns::HeaderStyle;
use crate::schema::VisitField;
use crate::{PerfError, Result};

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "PROVIDER_PERF";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Team name whose signings are tracked separately
    pub health_hut_label: String,

    /// Cell value meaning "yes" in the origin indicator columns
    pub affirmative_marker: String,

    /// chrono formats tried in order when parsing date cells
    pub date_formats: Vec<String>,

    /// Extra accepted headers, keyed by canonical field name
    pub column_aliases: BTreeMap<String, Vec<String>>,

    /// Header language for rendered tables
    pub header_style: HeaderStyle,

    /// Whether to show progress bars while reading input files
    pub enable_progress_bar: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            health_hut_label: crate::constants::DEFAULT_HEALTH_HUT_LABEL.to_string(),
            affirmative_marker: crate::constants::DEFAULT_AFFIRMATIVE_MARKER.to_string(),
            date_formats: default_date_formats(),
            column_aliases: BTreeMap::new(),
            header_style: HeaderStyle::English,
            enable_progress_bar: true,
        }
    }
}

fn default_date_formats() -> Vec<String> {
    [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%Y%m%d",
        "%m/%d/%Y",
        "%Y年%m月%d日",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl EngineConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables only
    ///
    /// Supported environment variables:
    /// - `PROVIDER_PERF_HEALTH_HUT_LABEL`
    /// - `PROVIDER_PERF_AFFIRMATIVE_MARKER`
    /// - `PROVIDER_PERF_HEADER_STYLE`: "english" or "chinese"
    /// - `PROVIDER_PERF_ENABLE_PROGRESS_BAR`: "true" or "false"
    pub fn from_env() -> Result<Self> {
        Self::layered(None)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| PerfError::Configuration {
                message: format!("Failed to parse config file: {}", e),
                suggestion: Some("Check that the file is valid TOML format".to_string()),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PerfError::Configuration {
                message: format!("Failed to serialize config: {}", e),
                suggestion: None,
            })?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/provider-perf/config.toml` on Unix-like systems
    /// or `%APPDATA%\provider-perf\config.toml` on Windows
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "provider-perf")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from defaults, the default config file and the environment
    ///
    /// Later sources override earlier ones:
    /// 1. Built-in defaults
    /// 2. Default config file (if it exists)
    /// 3. Environment variables
    pub fn load() -> Result<Self> {
        Self::layered(Self::default_config_path().as_deref())
    }

    /// Same as [`EngineConfig::load`] with an explicit config file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PerfError::file_not_found_with_suggestion(path.to_path_buf()));
        }
        Self::layered(Some(path))
    }

    fn layered(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX).try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.affirmative_marker.trim().is_empty() {
            return Err(PerfError::Configuration {
                message: "affirmative_marker must not be empty".to_string(),
                suggestion: Some("Use the value your source system writes for \"yes\", e.g. 是".to_string()),
            });
        }
        if self.date_formats.is_empty() {
            return Err(PerfError::Configuration {
                message: "date_formats must list at least one format".to_string(),
                suggestion: Some("Remove the key to fall back to the built-in formats".to_string()),
            });
        }
        let unknown: Vec<&str> = self
            .column_aliases
            .keys()
            .filter(|k| VisitField::from_canonical(k).is_none())
            .map(|k| k.as_str())
            .collect();
        if !unknown.is_empty() {
            return Err(PerfError::Configuration {
                message: format!("Unknown fields in column_aliases: {}", unknown.join(", ")),
                suggestion: Some(format!(
                    "Valid fields are: {}",
                    crate::schema::VisitSchema::column_names().join(", ")
                )),
            });
        }
        Ok(())
    }
}

/// Builder for customizing configuration
pub struct ConfigBuilder {
    config: EngineConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Start building a new configuration
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn health_hut_label<S: Into<String>>(mut self, label: S) -> Self {
        self.config.health_hut_label = label.into();
        self
    }

    pub fn affirmative_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.config.affirmative_marker = marker.into();
        self
    }

    /// Replace the list of accepted date formats
    pub fn date_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.date_formats = formats.into_iter().map(Into::into).collect();
        self
    }

    /// Accept an additional header for a field
    pub fn column_alias<S: Into<String>>(mut self, field: VisitField, header: S) -> Self {
        self.config
            .column_aliases
            .entry(field.canonical_name().to_string())
            .or_default()
            .push(header.into());
        self
    }

    pub fn header_style(mut self, style: HeaderStyle) -> Self {
        self.config.header_style = style;
        self
    }

    pub fn progress_bar(mut self, enabled: bool) -> Self {
        self.config.enable_progress_bar = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> EngineConfig {
        self.config
    }
}
