//! Shared runtime configuration for Courier plugin binaries.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then an
//! optional TOML file (`--config-path` or `COURIER_CONFIG_PATH`), then
//! `COURIER_*` environment variables, then command-line flags. Plugins load
//! it once at startup; a failure here is fatal and happens before the plugin
//! announces itself to the host.

mod defaults;
mod logging;

use std::ffi::OsString;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use self::defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_SETTINGS_FILE, default_log_filter, default_log_filter_string,
    default_log_format, default_settings_path,
};
pub use self::logging::{LogFormat, LogFormatParseError};

/// Resolved plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "COURIER")]
pub struct Config {
    /// `tracing` filter expression, for example `info` or `courier_channel=debug`.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log lines written to standard error.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Location of the key-value settings store persisted between runs.
    #[ortho_config(default = default_settings_path())]
    pub settings_path: Utf8PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            settings_path: default_settings_path(),
        }
    }
}

impl Config {
    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is treated as the binary name.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any layer is malformed.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::load_from_iter(args)
    }

    /// Returns the configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the settings store path.
    #[must_use]
    pub fn settings_path(&self) -> &Utf8Path {
        self.settings_path.as_path()
    }
}
