//! Where weather data comes from.
//!
//! Handlers depend on the [`WeatherSource`] trait so the data provider can
//! be swapped or mocked. The shipped [`StationSource`] reads observations
//! that the host has pushed into the `stations` settings entry; it performs
//! no network access.

use courier_channel::Settings;
use serde::Deserialize;
use thiserror::Error;

use crate::model::{ForecastDay, Observation};

/// Settings key holding station observations keyed by location.
pub const STATIONS_KEY: &str = "stations";

/// Errors raised by weather sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The source has no data for the location.
    #[error("no weather data for '{location}'")]
    UnknownLocation {
        /// Requested location.
        location: String,
    },
    /// The source holds data for the location but it cannot be decoded.
    #[error("weather data for '{location}' is malformed: {message}")]
    Malformed {
        /// Requested location.
        location: String,
        /// Decoder message.
        message: String,
    },
}

/// Provider of current conditions and forecasts.
///
/// Settings are passed on every call so providers can read credentials such
/// as `api_key` after the host updates them.
pub trait WeatherSource {
    /// Returns the current conditions at `location`.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when no usable data exists.
    fn current(&self, settings: &Settings, location: &str) -> Result<Observation, SourceError>;

    /// Returns the forecast for `location`.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when no usable data exists.
    fn forecast(&self, settings: &Settings, location: &str)
    -> Result<Vec<ForecastDay>, SourceError>;
}

#[derive(Debug, Deserialize)]
struct Station {
    current: Observation,
    #[serde(default)]
    forecast: Vec<ForecastDay>,
}

/// Serves observations stored under the `stations` settings key.
///
/// ```json
/// { "stations": { "Oslo": { "current": { "temperature": 4.0, "condition": "rain" },
///                           "forecast": [] } } }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct StationSource;

impl StationSource {
    fn station(settings: &Settings, location: &str) -> Result<Station, SourceError> {
        let raw = settings
            .get(STATIONS_KEY)
            .and_then(|stations| stations.get(location))
            .ok_or_else(|| SourceError::UnknownLocation {
                location: location.to_owned(),
            })?;
        Station::deserialize(raw).map_err(|error| SourceError::Malformed {
            location: location.to_owned(),
            message: error.to_string(),
        })
    }
}

impl WeatherSource for StationSource {
    fn current(&self, settings: &Settings, location: &str) -> Result<Observation, SourceError> {
        Self::station(settings, location).map(|station| station.current)
    }

    fn forecast(
        &self,
        settings: &Settings,
        location: &str,
    ) -> Result<Vec<ForecastDay>, SourceError> {
        Self::station(settings, location).map(|station| station.forecast)
    }
}
