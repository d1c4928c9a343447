//! Typed view over the weather plugin's settings.

use std::str::FromStr;

use courier_channel::{Params, Settings};
use serde_json::{Value, json};
use tracing::warn;

use crate::model::Units;

/// Location used when a request names none.
pub const DEFAULT_LOCATION: &str = "New York, NY";
/// Seconds between refreshes suggested to the host.
pub const DEFAULT_UPDATE_INTERVAL: u64 = 300;

const API_KEY: &str = "api_key";
const DEFAULT_LOCATION_KEY: &str = "default_location";
const UPDATE_INTERVAL: &str = "update_interval";
/// Settings key holding the unit system.
pub const UNITS: &str = "units";
/// Settings key holding the tracked locations.
pub const LOCATIONS: &str = "locations";

const SETTINGS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::settings");

/// Settings written on first run.
#[must_use]
pub fn default_settings() -> Params {
    let mut defaults = Params::new();
    defaults.insert(API_KEY.to_owned(), json!(""));
    defaults.insert(DEFAULT_LOCATION_KEY.to_owned(), json!(DEFAULT_LOCATION));
    defaults.insert(UPDATE_INTERVAL.to_owned(), json!(DEFAULT_UPDATE_INTERVAL));
    defaults.insert(UNITS.to_owned(), json!(Units::default()));
    defaults.insert(LOCATIONS.to_owned(), json!([DEFAULT_LOCATION]));
    defaults
}

/// Returns the location used when a request omits one.
#[must_use]
pub fn default_location(settings: &Settings) -> &str {
    settings
        .get_str(DEFAULT_LOCATION_KEY)
        .unwrap_or(DEFAULT_LOCATION)
}

/// Returns the configured unit system, falling back to metric when the
/// stored value is not recognised.
#[must_use]
pub fn units(settings: &Settings) -> Units {
    match settings.get_str(UNITS) {
        None => Units::default(),
        Some(text) => Units::from_str(text).unwrap_or_else(|_| {
            warn!(target: SETTINGS_TARGET, units = text, "unrecognised units, using metric");
            Units::default()
        }),
    }
}

/// Returns the tracked locations. Non-string entries are skipped.
#[must_use]
pub fn locations(settings: &Settings) -> Vec<String> {
    settings
        .get(LOCATIONS)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Adds a location to the tracked list. Returns `false` if it was present.
pub fn add_location(settings: &mut Settings, location: &str) -> bool {
    let mut tracked = locations(settings);
    if tracked.iter().any(|known| known == location) {
        return false;
    }
    tracked.push(location.to_owned());
    settings.insert(LOCATIONS, json!(tracked));
    true
}
