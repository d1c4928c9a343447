//! `execute` commands served by the weather plugin.

use std::rc::Rc;

use courier_channel::{CommandHandler, Context, HandlerError, Params, protocol::timestamp_now};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::alerts::{check_alerts, notify};
use crate::model::forecast_report;
use crate::settings::{default_location, locations, units};
use crate::source::WeatherSource;

/// Command returning current conditions.
pub const GET_CURRENT_WEATHER: &str = "getCurrentWeather";
/// Command returning the forecast.
pub const GET_FORECAST: &str = "getForecast";
/// Command refreshing every tracked location.
pub const REFRESH: &str = "refresh";
/// Event emitted for each refreshed location.
pub const WEATHER_UPDATED: &str = "weather_updated";

const COMMANDS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::commands");

/// Resolves the `location` parameter, defaulting to the configured location.
pub(crate) fn requested_location(
    params: &Params,
    context: &Context<'_>,
) -> Result<String, HandlerError> {
    match params.get("location") {
        None | Some(Value::Null) => Ok(default_location(context.settings()).to_owned()),
        Some(Value::String(location)) if !location.trim().is_empty() => Ok(location.clone()),
        Some(_) => Err(HandlerError::invalid_params(
            "location must be a non-empty string",
        )),
    }
}

fn source_failure(error: impl ToString) -> HandlerError {
    HandlerError::failed(error.to_string())
}

/// `getCurrentWeather {location?}`.
#[derive(Debug)]
pub struct CurrentWeather<S> {
    source: Rc<S>,
}

impl<S> CurrentWeather<S> {
    /// Creates the handler over a shared source.
    pub const fn new(source: Rc<S>) -> Self {
        Self { source }
    }
}

impl<S: WeatherSource> CommandHandler for CurrentWeather<S> {
    fn call(&self, params: &Params, context: &mut Context<'_>) -> Result<Value, HandlerError> {
        let location = requested_location(params, context)?;
        let observation = self
            .source
            .current(context.settings(), &location)
            .map_err(source_failure)?;
        Ok(observation.report(&location, units(context.settings())))
    }
}

/// `getForecast {location?}`.
#[derive(Debug)]
pub struct Forecast<S> {
    source: Rc<S>,
}

impl<S> Forecast<S> {
    /// Creates the handler over a shared source.
    pub const fn new(source: Rc<S>) -> Self {
        Self { source }
    }
}

impl<S: WeatherSource> CommandHandler for Forecast<S> {
    fn call(&self, params: &Params, context: &mut Context<'_>) -> Result<Value, HandlerError> {
        let location = requested_location(params, context)?;
        let days = self
            .source
            .forecast(context.settings(), &location)
            .map_err(source_failure)?;
        Ok(forecast_report(&location, &days, units(context.settings())))
    }
}

/// `refresh`: fetches every tracked location, emits `weather_updated` and
/// raises alerts.
///
/// A location that cannot be fetched is listed under `failed` and does not
/// stop the others.
#[derive(Debug)]
pub struct Refresh<S> {
    source: Rc<S>,
}

impl<S> Refresh<S> {
    /// Creates the handler over a shared source.
    pub const fn new(source: Rc<S>) -> Self {
        Self { source }
    }
}

impl<S: WeatherSource> Refresh<S> {
    fn refresh_location(
        &self,
        context: &mut Context<'_>,
        location: &str,
    ) -> Result<usize, HandlerError> {
        let settings = context.settings();
        let current = self
            .source
            .current(settings, location)
            .map_err(source_failure)?;
        let forecast = self
            .source
            .forecast(settings, location)
            .map_err(source_failure)?;
        let units = units(settings);

        let mut payload = Params::new();
        payload.insert(String::from("location"), json!(location));
        payload.insert(String::from("current"), current.report(location, units));
        payload.insert(
            String::from("forecast"),
            forecast_report(location, &forecast, units),
        );
        payload.insert(
            String::from("timestamp"),
            json!(timestamp_now().map_err(source_failure)?),
        );
        context.emit_event(WEATHER_UPDATED, payload)?;

        let alerts = check_alerts(location, &current);
        notify(context, &alerts)?;
        debug!(target: COMMANDS_TARGET, location, alerts = alerts.len(), "refreshed location");
        Ok(alerts.len())
    }
}

impl<S: WeatherSource> CommandHandler for Refresh<S> {
    fn call(&self, _params: &Params, context: &mut Context<'_>) -> Result<Value, HandlerError> {
        let mut updated = Vec::new();
        let mut failed = Vec::new();
        let mut alert_count = 0_usize;

        for location in locations(context.settings()) {
            match self.refresh_location(context, &location) {
                Ok(count) => {
                    alert_count += count;
                    updated.push(location);
                }
                Err(HandlerError::Host(error)) => return Err(HandlerError::Host(error)),
                Err(error) => {
                    warn!(target: COMMANDS_TARGET, location, %error, "failed to refresh location");
                    failed.push(json!({ "location": location, "error": error.to_string() }));
                }
            }
        }

        Ok(json!({
            "updated": updated,
            "failed": failed,
            "alerts": alert_count,
        }))
    }
}
