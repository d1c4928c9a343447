//! Example weather plugin built on the courier message channel.
//!
//! The plugin tracks a list of locations, answers current-conditions and
//! forecast commands, pushes `weather_updated` events on `refresh` and asks
//! the host to show a notification when conditions are severe. Weather data
//! comes from a [`WeatherSource`]; the binary uses [`StationSource`].

pub mod alerts;
pub mod commands;
pub mod events;
pub mod model;
pub mod settings;
pub mod source;

#[cfg(test)]
mod tests;

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::rc::Rc;

use courier_channel::{Params, Plugin, PluginIdentity, Registry, RegistryError, SettingsStore};

use crate::commands::{
    CurrentWeather, Forecast, GET_CURRENT_WEATHER, GET_FORECAST, REFRESH, Refresh,
};
use crate::events::{
    LOCATION_CHANGED, LocationChanged, SETTINGS_UPDATED, SettingsUpdated, WEATHER_REQUEST,
    WeatherRequest,
};
pub use crate::source::{SourceError, StationSource, WeatherSource};

/// Plugin identifier reported to the host.
pub const PLUGIN_ID: &str = "com.example.weather";
/// Plugin version reported to the host.
pub const PLUGIN_VERSION: &str = "1.0.0";
/// Display name.
pub const PLUGIN_NAME: &str = "Weather Plugin";
/// Short description.
pub const PLUGIN_DESCRIPTION: &str = "Weather conditions, forecasts and severe weather alerts";

/// The weather plugin over a data source.
#[derive(Debug)]
pub struct WeatherPlugin<S> {
    source: Rc<S>,
}

impl<S> WeatherPlugin<S> {
    /// Creates the plugin over `source`.
    pub fn new(source: S) -> Self {
        Self {
            source: Rc::new(source),
        }
    }
}

impl<S: WeatherSource + 'static> Plugin for WeatherPlugin<S> {
    fn identity(&self) -> PluginIdentity {
        PluginIdentity::new(PLUGIN_ID, PLUGIN_VERSION, PLUGIN_NAME, PLUGIN_DESCRIPTION)
    }

    fn default_settings(&self) -> Params {
        settings::default_settings()
    }

    fn register(
        &self,
        registry: &mut Registry,
        store: Rc<dyn SettingsStore>,
    ) -> Result<(), RegistryError> {
        registry.register_command(
            GET_CURRENT_WEATHER,
            CurrentWeather::new(Rc::clone(&self.source)),
        )?;
        registry.register_command(GET_FORECAST, Forecast::new(Rc::clone(&self.source)))?;
        registry.register_command(REFRESH, Refresh::new(Rc::clone(&self.source)))?;
        registry.register_event(LOCATION_CHANGED, LocationChanged::new(Rc::clone(&store)))?;
        registry.register_event(SETTINGS_UPDATED, SettingsUpdated::new(store))?;
        registry.register_event(
            WEATHER_REQUEST,
            WeatherRequest::new(Rc::clone(&self.source)),
        )?;
        Ok(())
    }
}

/// Serves the weather plugin with the station source until shutdown or end
/// of input.
pub fn run<I, R, W, E>(args: I, reader: R, writer: W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    courier_channel::launch(
        &WeatherPlugin::new(StationSource),
        args,
        reader,
        writer,
        stderr,
    )
}
