//! Weather observations and their rendering for the host.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{Display, EnumString};

/// Unit system used when reporting temperatures.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Units {
    /// Degrees Celsius.
    #[default]
    Metric,
    /// Degrees Fahrenheit.
    Imperial,
}

impl Units {
    /// Converts a Celsius reading into this unit system.
    #[expect(
        clippy::float_arithmetic,
        reason = "temperature conversion is inherently floating point"
    )]
    #[must_use]
    pub fn temperature(self, celsius: f64) -> f64 {
        match self {
            Self::Metric => celsius,
            Self::Imperial => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// Returns the temperature symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Metric => "°C",
            Self::Imperial => "°F",
        }
    }
}

/// Current conditions at a location. Temperatures are stored in Celsius.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Observation {
    /// Air temperature in degrees Celsius.
    pub temperature: f64,
    /// Free-text condition, for example `"light rain"`.
    pub condition: String,
    /// Relative humidity in percent, as reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
}

impl Observation {
    /// Renders the observation in the requested units.
    #[must_use]
    pub fn report(&self, location: &str, units: Units) -> Value {
        json!({
            "location": location,
            "temperature": units.temperature(self.temperature),
            "units": units,
            "condition": self.condition,
            "humidity": self.humidity,
        })
    }
}

/// One day of a forecast. Temperatures are stored in Celsius.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ForecastDay {
    /// Day label as supplied by the source, for example a date.
    pub day: String,
    /// Daily high in degrees Celsius.
    pub high: f64,
    /// Daily low in degrees Celsius.
    pub low: f64,
    /// Expected condition.
    pub condition: String,
}

impl ForecastDay {
    fn report(&self, units: Units) -> Value {
        json!({
            "day": self.day,
            "high": units.temperature(self.high),
            "low": units.temperature(self.low),
            "condition": self.condition,
        })
    }
}

/// Renders a forecast in the requested units.
#[must_use]
pub fn forecast_report(location: &str, days: &[ForecastDay], units: Units) -> Value {
    let days: Vec<Value> = days.iter().map(|day| day.report(units)).collect();
    json!({
        "location": location,
        "units": units,
        "days": days,
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Units::Metric, 20.0, 20.0)]
    #[case(Units::Imperial, 100.0, 212.0)]
    #[case(Units::Imperial, -40.0, -40.0)]
    fn converts_temperatures(#[case] units: Units, #[case] celsius: f64, #[case] expected: f64) {
        assert!((units.temperature(celsius) - expected).abs() < 1e-9);
    }

    #[rstest]
    #[case("metric", Units::Metric)]
    #[case("Imperial", Units::Imperial)]
    fn parses_units(#[case] text: &str, #[case] expected: Units) {
        assert_eq!(Units::from_str(text).expect("parse units"), expected);
    }

    #[test]
    fn reports_convert_every_temperature() {
        let days = vec![ForecastDay {
            day: String::from("2026-10-20"),
            high: 10.0,
            low: 0.0,
            condition: String::from("clear"),
        }];
        let report = forecast_report("Oslo", &days, Units::Imperial);

        assert_eq!(report["units"], json!("imperial"));
        assert_eq!(report["days"][0]["high"], json!(50.0));
        assert_eq!(report["days"][0]["low"], json!(32.0));
    }

    #[test]
    fn current_report_keeps_condition_and_humidity() {
        let observation = Observation {
            temperature: 21.5,
            condition: String::from("sunny"),
            humidity: Some(40.5),
        };
        let report = observation.report("Lima", Units::Metric);

        assert_eq!(
            report,
            json!({
                "location": "Lima",
                "temperature": 21.5,
                "units": "metric",
                "condition": "sunny",
                "humidity": 40.5,
            })
        );
    }
}
