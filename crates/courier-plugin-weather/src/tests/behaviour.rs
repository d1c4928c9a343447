//! Behaviour-driven tests running the weather plugin behind a live channel.

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use courier_channel::{
    Channel, Plugin, Registry, Session, Settings, SettingsStore, StoreError,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};

use crate::settings::{LOCATIONS, default_settings};
use crate::source::STATIONS_KEY;
use crate::{StationSource, WeatherPlugin};

#[derive(Debug, Default)]
struct MemoryStore {
    saved: RefCell<Option<Settings>>,
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Option<Settings>, StoreError> {
        Ok(self.saved.borrow().clone())
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        self.saved.replace(Some(settings.clone()));
        Ok(())
    }
}

struct World {
    settings: Settings,
    input: Vec<String>,
    output: Option<Vec<Value>>,
    store: Rc<MemoryStore>,
}

impl Default for World {
    fn default() -> Self {
        Self {
            settings: Settings::from(default_settings()),
            input: Vec::new(),
            output: None,
            store: Rc::new(MemoryStore::default()),
        }
    }
}

impl World {
    fn messages(&mut self) -> &[Value] {
        if self.output.is_none() {
            let plugin = WeatherPlugin::new(StationSource);
            let mut registry = Registry::with_builtins();
            let store: Rc<dyn SettingsStore> = Rc::clone(&self.store) as Rc<dyn SettingsStore>;
            plugin
                .register(&mut registry, store)
                .expect("register handlers");
            let session = Session::with_settings(plugin.identity(), self.settings.clone());

            let mut bytes = Vec::new();
            let input = format!("{}\n", self.input.join("\n"));
            let reader = Cursor::new(input.into_bytes());
            let mut channel = Channel::new(reader, &mut bytes, session, registry);
            channel.run().expect("channel runs");
            drop(channel);

            let messages = String::from_utf8(bytes)
                .expect("utf8")
                .lines()
                .map(|line| serde_json::from_str(line).expect("JSON line"))
                .collect();
            self.output = Some(messages);
        }
        self.output.as_deref().unwrap_or_default()
    }

    fn reply(&mut self, message_id: &str) -> Value {
        let messages = self.messages();
        messages
            .iter()
            .find(|message| message["messageId"] == message_id)
            .cloned()
            .unwrap_or_else(|| panic!("no reply to {message_id} in {messages:?}"))
    }
}

fn strip_quotes(text: &str) -> &str {
    text.trim_matches('"')
}

#[fixture]
fn world() -> RefCell<World> {
    RefCell::new(World::default())
}

#[given("a station {location} reporting {temperature} degrees and {condition}")]
fn given_station(world: &RefCell<World>, location: String, temperature: f64, condition: String) {
    let mut state = world.borrow_mut();
    let mut stations = state
        .settings
        .get(STATIONS_KEY)
        .cloned()
        .unwrap_or_else(|| json!({}));
    if let Some(table) = stations.as_object_mut() {
        table.insert(
            strip_quotes(&location).to_owned(),
            json!({
                "current": {"temperature": temperature, "condition": strip_quotes(&condition)},
                "forecast": [],
            }),
        );
    }
    state.settings.insert(STATIONS_KEY, stations);
}

#[given("the plugin tracks {first} and {second}")]
fn given_tracked(world: &RefCell<World>, first: String, second: String) {
    world.borrow_mut().settings.insert(
        LOCATIONS,
        json!([strip_quotes(&first), strip_quotes(&second)]),
    );
}

#[when("the host sends the line {line}")]
fn when_line_sent(world: &RefCell<World>, line: String) {
    world.borrow_mut().input.push(line);
}

#[then("a {event_type} event is written for {location}")]
fn then_event_written(world: &RefCell<World>, event_type: String, location: String) {
    let mut state = world.borrow_mut();
    let messages = state.messages();
    let found = messages.iter().any(|message| {
        message["type"] == strip_quotes(&event_type)
            && message["location"] == strip_quotes(&location)
    });
    assert!(found, "no {event_type} for {location} in {messages:?}");
}

#[then("{count} high priority notification is requested")]
fn then_notifications(world: &RefCell<World>, count: usize) {
    let mut state = world.borrow_mut();
    let notifications = state
        .messages()
        .iter()
        .filter(|message| {
            message["type"] == "host_call"
                && message["method"] == "show_notification"
                && message["params"]["priority"] == "high"
        })
        .count();
    assert_eq!(notifications, count);
}

#[then("the reply to {message_id} lists {count} updated locations")]
fn then_updated_count(world: &RefCell<World>, message_id: String, count: usize) {
    let reply = world.borrow_mut().reply(strip_quotes(&message_id));
    let updated = reply["result"]["updated"].as_array().map_or(0, Vec::len);
    assert_eq!(updated, count, "reply: {reply}");
}

#[then("the reply to {message_id} reports a temperature of {temperature}")]
fn then_temperature(world: &RefCell<World>, message_id: String, temperature: f64) {
    let reply = world.borrow_mut().reply(strip_quotes(&message_id));
    let reported = reply["result"]["temperature"]
        .as_f64()
        .expect("numeric temperature");
    assert!((reported - temperature).abs() < 1e-6, "reply: {reply}");
}

#[then("the reply to {message_id} is an error mentioning {text}")]
fn then_error_mentions(world: &RefCell<World>, message_id: String, text: String) {
    let reply = world.borrow_mut().reply(strip_quotes(&message_id));
    assert_eq!(reply["type"], "error", "reply: {reply}");
    let error = reply["error"].as_str().expect("error text");
    assert!(error.contains(strip_quotes(&text)), "reply: {reply}");
}

#[then("the reply to {message_id} has type {kind}")]
fn then_reply_type(world: &RefCell<World>, message_id: String, kind: String) {
    let reply = world.borrow_mut().reply(strip_quotes(&message_id));
    assert_eq!(reply["type"], strip_quotes(&kind), "reply: {reply}");
}

#[then("the settings track {location}")]
fn then_settings_track(world: &RefCell<World>, location: String) {
    let mut state = world.borrow_mut();
    state.messages();
    let saved = state.store.saved.borrow().clone().expect("settings saved");
    let tracked = saved
        .get(LOCATIONS)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    assert!(
        tracked.contains(&json!(strip_quotes(&location))),
        "tracked: {tracked:?}"
    );
}

#[scenario(
    path = "tests/features/weather_plugin.feature",
    name = "Refresh reports every tracked location and raises alerts"
)]
fn refresh_with_alerts(world: RefCell<World>) {
    drop(world);
}

#[scenario(
    path = "tests/features/weather_plugin.feature",
    name = "A new location can be queried after the host adds it"
)]
fn location_change(world: RefCell<World>) {
    drop(world);
}

#[scenario(
    path = "tests/features/weather_plugin.feature",
    name = "Unit changes apply to later reports"
)]
fn unit_change(world: RefCell<World>) {
    drop(world);
}

#[scenario(
    path = "tests/features/weather_plugin.feature",
    name = "Unknown locations fail without stopping the plugin"
)]
fn unknown_location(world: RefCell<World>) {
    drop(world);
}
