use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default log filter expression used by the plugin binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// File name of the settings store when no path is configured.
pub const DEFAULT_SETTINGS_FILE: &str = "config.json";

/// Default log filter expression used by the plugin binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the plugin binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Settings store location, relative to the plugin's working directory.
#[must_use]
pub fn default_settings_path() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_SETTINGS_FILE)
}
