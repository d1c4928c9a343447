//! Host events handled by the weather plugin.
//!
//! Setting changes are saved as soon as they are applied, in addition to
//! the save performed at shutdown. A failed save is logged and the change
//! stays in memory.

use std::rc::Rc;
use std::str::FromStr;

use courier_channel::{
    Context, EventHandler, HandlerError, Params, SettingsStore, protocol::timestamp_now,
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::model::{Units, forecast_report};
use crate::settings::{UNITS, add_location, units};
use crate::source::WeatherSource;

/// Host event adding a tracked location.
pub const LOCATION_CHANGED: &str = "location_changed";
/// Host event merging new settings.
pub const SETTINGS_UPDATED: &str = "settings_updated";
/// Host event asking for weather data outside a command.
pub const WEATHER_REQUEST: &str = "weather_request";
/// Event emitted in reply to [`WEATHER_REQUEST`].
pub const WEATHER_RESPONSE: &str = "weather_response";

const EVENTS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::events");

fn persist(store: &dyn SettingsStore, context: &Context<'_>) {
    if let Err(error) = store.save(context.settings()) {
        warn!(target: EVENTS_TARGET, %error, "failed to save settings");
    }
}

fn required_string<'p>(payload: &'p Params, key: &str) -> Result<&'p str, HandlerError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| HandlerError::invalid_params(format!("{key} must be a non-empty string")))
}

/// `location_changed {location}`: starts tracking a location.
pub struct LocationChanged {
    store: Rc<dyn SettingsStore>,
}

impl LocationChanged {
    /// Creates the handler, saving through `store`.
    pub fn new(store: Rc<dyn SettingsStore>) -> Self {
        Self { store }
    }
}

impl EventHandler for LocationChanged {
    fn call(&self, payload: &Params, context: &mut Context<'_>) -> Result<(), HandlerError> {
        let location = required_string(payload, "location")?;
        if add_location(context.settings_mut(), location) {
            info!(target: EVENTS_TARGET, location, "tracking new location");
            persist(&*self.store, context);
        }
        Ok(())
    }
}

/// `settings_updated {settings}`: merges new values into the settings.
pub struct SettingsUpdated {
    store: Rc<dyn SettingsStore>,
}

impl SettingsUpdated {
    /// Creates the handler, saving through `store`.
    pub fn new(store: Rc<dyn SettingsStore>) -> Self {
        Self { store }
    }
}

impl EventHandler for SettingsUpdated {
    fn call(&self, payload: &Params, context: &mut Context<'_>) -> Result<(), HandlerError> {
        let updates = match payload.get("settings") {
            None => Params::new(),
            Some(Value::Object(updates)) => updates.clone(),
            Some(_) => return Err(HandlerError::invalid_params("settings must be an object")),
        };
        if let Some(requested) = updates.get(UNITS) {
            let valid = requested
                .as_str()
                .is_some_and(|text| Units::from_str(text).is_ok());
            if !valid {
                return Err(HandlerError::invalid_params(format!(
                    "units must be one of metric, imperial; got {requested}"
                )));
            }
        }

        let keys = updates.len();
        context.settings_mut().merge(updates);
        info!(target: EVENTS_TARGET, keys, units = %units(context.settings()), "settings updated");
        persist(&*self.store, context);
        Ok(())
    }
}

/// `weather_request {location, requestType?}`: answers with a
/// `weather_response` event. `requestType` is `current` (the default) or
/// `forecast`.
#[derive(Debug)]
pub struct WeatherRequest<S> {
    source: Rc<S>,
}

impl<S> WeatherRequest<S> {
    /// Creates the handler over a shared source.
    pub const fn new(source: Rc<S>) -> Self {
        Self { source }
    }
}

impl<S: WeatherSource> EventHandler for WeatherRequest<S> {
    fn call(&self, payload: &Params, context: &mut Context<'_>) -> Result<(), HandlerError> {
        let location = required_string(payload, "location")?;
        let request_type = payload
            .get("requestType")
            .and_then(Value::as_str)
            .unwrap_or("current");
        let units = units(context.settings());

        let data = match request_type {
            "current" => self
                .source
                .current(context.settings(), location)
                .map(|observation| observation.report(location, units)),
            "forecast" => self
                .source
                .forecast(context.settings(), location)
                .map(|days| forecast_report(location, &days, units)),
            other => {
                return Err(HandlerError::invalid_params(format!(
                    "unknown weather request type: {other}"
                )));
            }
        }
        .map_err(|error| HandlerError::failed(error.to_string()))?;

        let mut response = Params::new();
        response.insert(String::from("location"), json!(location));
        response.insert(String::from("requestType"), json!(request_type));
        response.insert(String::from("data"), data);
        let timestamp = timestamp_now().map_err(|error| HandlerError::failed(error.to_string()))?;
        response.insert(String::from("timestamp"), json!(timestamp));
        context.emit_event(WEATHER_RESPONSE, response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use courier_channel::{PluginIdentity, RecordingHost, Session, Settings, StoreError};
    use mockall::mock;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::settings::{LOCATIONS, default_settings};
    use crate::source::StationSource;

    mock! {
        Store {}
        impl SettingsStore for Store {
            fn load(&self) -> Result<Option<Settings>, StoreError>;
            fn save(&self, settings: &Settings) -> Result<(), StoreError>;
        }
    }

    #[fixture]
    fn session() -> Session {
        let mut settings = Settings::from(default_settings());
        settings.insert(
            "stations",
            json!({"Oslo": {"current": {"temperature": 2.0, "condition": "snow"}}}),
        );
        Session::with_settings(
            PluginIdentity::new("com.example.weather", "1.0.0", "Weather", "Weather test"),
            settings,
        )
    }

    fn payload(entries: Value) -> Params {
        match entries {
            Value::Object(map) => map,
            other => panic!("payload must be an object, got {other}"),
        }
    }

    fn saving_store(saved: &Rc<RefCell<Vec<Settings>>>) -> Rc<dyn SettingsStore> {
        let sink = Rc::clone(saved);
        let mut store = MockStore::new();
        store.expect_save().returning_st(move |settings| {
            sink.borrow_mut().push(settings.clone());
            Ok(())
        });
        Rc::new(store)
    }

    #[rstest]
    fn new_locations_are_tracked_and_saved(mut session: Session) {
        let mut store = MockStore::new();
        store.expect_save().once().returning(|_| Ok(()));
        let handler = LocationChanged::new(Rc::new(store));
        let mut host = RecordingHost::new();
        let mut context = Context::new(&mut session, &mut host);

        handler
            .call(&payload(json!({"location": "Oslo"})), &mut context)
            .expect("first change");
        handler
            .call(&payload(json!({"location": "Oslo"})), &mut context)
            .expect("repeat change");

        assert_eq!(
            session.settings().get(LOCATIONS),
            Some(&json!(["New York, NY", "Oslo"]))
        );
    }

    #[rstest]
    fn location_is_required(mut session: Session) {
        let handler = LocationChanged::new(Rc::new(MockStore::new()));
        let mut host = RecordingHost::new();
        let mut context = Context::new(&mut session, &mut host);

        let error = handler
            .call(&Params::new(), &mut context)
            .expect_err("missing location");
        assert_eq!(
            error.to_string(),
            "invalid params: location must be a non-empty string"
        );
    }

    #[rstest]
    fn save_failures_keep_the_change(mut session: Session) {
        let mut store = MockStore::new();
        store.expect_save().returning(|_| {
            Err(StoreError::NotAnObject {
                path: "config.json".into(),
            })
        });
        let handler = LocationChanged::new(Rc::new(store));
        let mut host = RecordingHost::new();
        let mut context = Context::new(&mut session, &mut host);

        handler
            .call(&payload(json!({"location": "Lima"})), &mut context)
            .expect("change applied");
        assert_eq!(
            session.settings().get(LOCATIONS),
            Some(&json!(["New York, NY", "Lima"]))
        );
    }

    #[rstest]
    fn settings_updates_merge_and_save(mut session: Session) {
        let saved = Rc::new(RefCell::new(Vec::new()));
        let handler = SettingsUpdated::new(saving_store(&saved));
        let mut host = RecordingHost::new();
        let mut context = Context::new(&mut session, &mut host);

        handler
            .call(
                &payload(json!({"settings": {"units": "imperial", "api_key": "k"}})),
                &mut context,
            )
            .expect("update");

        assert_eq!(units(session.settings()), Units::Imperial);
        assert_eq!(session.settings().get_str("api_key"), Some("k"));
        assert_eq!(
            session.settings().get_str("default_location"),
            Some("New York, NY")
        );
        assert_eq!(saved.borrow().len(), 1);
    }

    #[rstest]
    #[case(json!({"settings": "nope"}))]
    #[case(json!({"settings": {"units": "kelvin"}}))]
    fn invalid_settings_updates_are_rejected(mut session: Session, #[case] update: Value) {
        let handler = SettingsUpdated::new(Rc::new(MockStore::new()));
        let mut host = RecordingHost::new();
        let mut context = Context::new(&mut session, &mut host);

        let error = handler
            .call(&payload(update), &mut context)
            .expect_err("invalid update");
        assert!(matches!(error, HandlerError::InvalidParams { .. }));
        assert_eq!(units(session.settings()), Units::Metric);
    }

    #[rstest]
    #[case::current(json!({"location": "Oslo"}), "current")]
    #[case::forecast(json!({"location": "Oslo", "requestType": "forecast"}), "forecast")]
    fn weather_requests_emit_responses(
        mut session: Session,
        #[case] request: Value,
        #[case] expected_type: &str,
    ) {
        let handler = WeatherRequest::new(Rc::new(StationSource));
        let mut host = RecordingHost::new();
        let mut context = Context::new(&mut session, &mut host);

        handler
            .call(&payload(request), &mut context)
            .expect("request handled");

        let responses = host.events_of(WEATHER_RESPONSE);
        assert_eq!(responses.len(), 1);
        let response = responses.first().expect("one response");
        assert_eq!(response.get("requestType"), Some(&json!(expected_type)));
        assert_eq!(response.get("location"), Some(&json!("Oslo")));
        assert!(response.contains_key("timestamp"));
    }

    #[rstest]
    fn unknown_request_types_are_rejected(mut session: Session) {
        let handler = WeatherRequest::new(Rc::new(StationSource));
        let mut host = RecordingHost::new();
        let mut context = Context::new(&mut session, &mut host);

        let error = handler
            .call(
                &payload(json!({"location": "Oslo", "requestType": "radar"})),
                &mut context,
            )
            .expect_err("unknown type");
        assert_eq!(
            error.to_string(),
            "invalid params: unknown weather request type: radar"
        );
        assert!(host.events.is_empty());
    }
}
