//! Severe weather detection and host notifications.

use courier_channel::{Context, HostError, Params};
use serde_json::json;
use strum::Display;
use tracing::warn;

use crate::model::Observation;

/// Temperatures above this many degrees Celsius raise a heat warning.
pub const HEAT_THRESHOLD: f64 = 35.0;
/// Temperatures below this many degrees Celsius raise a cold warning.
pub const COLD_THRESHOLD: f64 = -10.0;
/// Condition keywords that raise a severe weather alert.
pub const SEVERE_CONDITIONS: &[&str] = &["storm", "tornado", "hurricane"];

/// Host API used to surface alerts.
pub const NOTIFICATION_METHOD: &str = "show_notification";

const ALERTS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::alerts");

/// Category of a weather alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AlertKind {
    /// Temperature above [`HEAT_THRESHOLD`].
    HeatWarning,
    /// Temperature below [`COLD_THRESHOLD`].
    ColdWarning,
    /// Condition mentions one of [`SEVERE_CONDITIONS`].
    SevereWeather,
}

/// A weather alert for one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Alert category.
    pub kind: AlertKind,
    /// Message shown to the user.
    pub message: String,
}

/// Checks an observation against the alert thresholds.
///
/// At most one temperature alert is raised; a severe condition adds a
/// second alert.
#[must_use]
pub fn check_alerts(location: &str, observation: &Observation) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let temperature = observation.temperature;

    if temperature > HEAT_THRESHOLD {
        alerts.push(Alert {
            kind: AlertKind::HeatWarning,
            message: format!("High temperature alert: {temperature}°C in {location}"),
        });
    } else if temperature < COLD_THRESHOLD {
        alerts.push(Alert {
            kind: AlertKind::ColdWarning,
            message: format!("Low temperature alert: {temperature}°C in {location}"),
        });
    }

    let condition = observation.condition.to_lowercase();
    if SEVERE_CONDITIONS
        .iter()
        .any(|keyword| condition.contains(keyword))
    {
        alerts.push(Alert {
            kind: AlertKind::SevereWeather,
            message: format!("Severe weather alert: {condition} in {location}"),
        });
    }
    alerts
}

/// Sends each alert to the host as a high-priority notification.
///
/// # Errors
///
/// Returns the first delivery failure.
pub fn notify(context: &mut Context<'_>, alerts: &[Alert]) -> Result<(), HostError> {
    for alert in alerts {
        warn!(target: ALERTS_TARGET, kind = %alert.kind, message = %alert.message, "weather alert");
        let mut params = Params::new();
        params.insert(String::from("title"), json!("Weather Alert"));
        params.insert(String::from("message"), json!(alert.message));
        params.insert(String::from("type"), json!("warning"));
        params.insert(String::from("priority"), json!("high"));
        params.insert(String::from("alert"), json!(alert.kind.to_string()));
        context.call_host_api(NOTIFICATION_METHOD, params)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use courier_channel::{PluginIdentity, RecordingHost, Session};
    use rstest::rstest;

    use super::*;

    fn observation(temperature: f64, condition: &str) -> Observation {
        Observation {
            temperature,
            condition: condition.to_owned(),
            humidity: None,
        }
    }

    #[rstest]
    #[case::mild(20.0, "clear", vec![])]
    #[case::boundary_heat(35.0, "clear", vec![])]
    #[case::heat(36.0, "clear", vec![AlertKind::HeatWarning])]
    #[case::boundary_cold(-10.0, "snow", vec![])]
    #[case::cold(-12.5, "snow", vec![AlertKind::ColdWarning])]
    #[case::storm(18.0, "Thunderstorm", vec![AlertKind::SevereWeather])]
    #[case::hot_hurricane(
        38.0,
        "hurricane",
        vec![AlertKind::HeatWarning, AlertKind::SevereWeather]
    )]
    fn classifies_observations(
        #[case] temperature: f64,
        #[case] condition: &str,
        #[case] expected: Vec<AlertKind>,
    ) {
        let kinds: Vec<AlertKind> = check_alerts("Oslo", &observation(temperature, condition))
            .into_iter()
            .map(|alert| alert.kind)
            .collect();
        assert_eq!(kinds, expected);
    }

    #[test]
    fn messages_name_the_location() {
        let alerts = check_alerts("Phoenix, AZ", &observation(41.0, "sunny"));
        assert_eq!(
            alerts.first().map(|alert| alert.message.as_str()),
            Some("High temperature alert: 41°C in Phoenix, AZ")
        );
    }

    #[test]
    fn notifications_are_high_priority_host_calls() {
        let mut session = Session::new(PluginIdentity::new("w", "1", "W", "W"));
        let mut host = RecordingHost::new();
        let mut context = Context::new(&mut session, &mut host);
        let alerts = check_alerts("Miami", &observation(30.0, "tropical storm"));

        notify(&mut context, &alerts).expect("notify");

        assert_eq!(host.calls.len(), 1);
        let (method, params) = host.calls.first().expect("one call");
        assert_eq!(method, NOTIFICATION_METHOD);
        assert_eq!(params.get("priority"), Some(&json!("high")));
        assert_eq!(params.get("title"), Some(&json!("Weather Alert")));
        assert_eq!(
            params.get("message"),
            Some(&json!("Severe weather alert: tropical storm in Miami"))
        );
    }
}
