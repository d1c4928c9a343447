//! Per-process session state handed to every handler.
//!
//! A [`Session`] replaces ambient globals: the plugin identity and the
//! key-value settings live here and reach handlers through
//! [`Context`](crate::Context). Tests build sessions directly.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::protocol::Params;

/// Static identity metadata reported by `ready` and `getInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginIdentity {
    id: String,
    version: String,
    name: String,
    description: String,
}

impl PluginIdentity {
    /// Creates an identity record.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            name: name.into(),
            description: description.into(),
        }
    }

    /// Returns the plugin identifier.
    #[must_use]
    pub const fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the plugin version.
    #[must_use]
    pub const fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Returns the display name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the description.
    #[must_use]
    pub const fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Renders the `getInfo` result payload.
    #[must_use]
    pub fn info_payload(&self) -> Value {
        json!({
            "pluginId": self.id,
            "version": self.version,
            "name": self.name,
            "description": self.description,
        })
    }
}

/// Key-value settings loaded at startup and persisted on shutdown.
///
/// The channel does not impose a schema; plugins interpret the keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(Params);

impl Settings {
    /// Creates an empty settings map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the string stored under `key`, if it is a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Overwrites entries with the values in `updates`.
    pub fn merge(&mut self, updates: Params) {
        self.0.extend(updates);
    }

    /// Fills in any key from `defaults` that is not already set.
    pub fn fill_defaults(&mut self, defaults: Params) {
        for (key, value) in defaults {
            self.0.entry(key).or_insert(value);
        }
    }

    /// Returns the underlying map.
    #[must_use]
    pub const fn as_map(&self) -> &Params {
        &self.0
    }

    /// Returns `true` when no keys are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Params> for Settings {
    fn from(map: Params) -> Self {
        Self(map)
    }
}

/// Mutable session state owned by the channel.
#[derive(Debug, Clone)]
pub struct Session {
    identity: PluginIdentity,
    settings: Settings,
}

impl Session {
    /// Creates a session with empty settings.
    #[must_use]
    pub fn new(identity: PluginIdentity) -> Self {
        Self::with_settings(identity, Settings::new())
    }

    /// Creates a session with preloaded settings.
    #[must_use]
    pub const fn with_settings(identity: PluginIdentity, settings: Settings) -> Self {
        Self { identity, settings }
    }

    /// Returns the plugin identity.
    #[must_use]
    pub const fn identity(&self) -> &PluginIdentity {
        &self.identity
    }

    /// Returns the current settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the settings for modification.
    pub const fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn info_payload_lists_identity_fields() {
        let identity = PluginIdentity::new("com.example.demo", "1.2.0", "Demo", "Does things");
        assert_eq!(
            identity.info_payload(),
            json!({
                "pluginId": "com.example.demo",
                "version": "1.2.0",
                "name": "Demo",
                "description": "Does things",
            })
        );
    }

    #[test]
    fn fill_defaults_keeps_existing_values() {
        let mut settings = Settings::from(params(json!({"units": "imperial"})));
        settings.fill_defaults(params(json!({"units": "metric", "update_interval": 300})));

        assert_eq!(settings.get_str("units"), Some("imperial"));
        assert_eq!(settings.get("update_interval"), Some(&json!(300)));
    }

    #[test]
    fn merge_overwrites_values() {
        let mut settings = Settings::from(params(json!({"units": "metric"})));
        settings.merge(params(json!({"units": "imperial", "api_key": "k"})));

        assert_eq!(settings.get_str("units"), Some("imperial"));
        assert_eq!(settings.get_str("api_key"), Some("k"));
    }
}
