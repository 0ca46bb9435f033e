use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config_value::{ActionKind, TypedValue};

/// Prefix VRChat expects in front of avatar parameter names.
pub const AVATAR_PARAMETERS_PREFIX: &str = "/avatar/parameters/";

/// Seconds a controller detection stays valid before the runtime probes again.
pub const CONTROLLER_REFRESH_SECS: i64 = 10;

/// Root configuration document.
///
/// Expecting JSON like:
/// ```JSON
/// {
///   "IP": "127.0.0.1", "Port": 9000, "PollingRate": 20, "StickMoveTolerance": 500,
///   "ControllerType": { "enabled": true, "last_value": 0, "timestamp": 0 },
///   "LeftThumb": true, "RightThumb": true,
///   "LeftABButtons": false, "RightABButtons": false,
///   "default_bindings": [ { "controller_type": "knuckles", "binding_url": "bindings/knuckles.json" } ],
///   "actions": [ { "name": "/actions/thumbparams/in/Jump", "type": "boolean",
///                  "osc_parameter": "Jump", "enabled": true, "floating": 0.0,
///                  "timestamp": 0, "last_value": false } ]
/// }
/// ```
/// Keys outside this set (the file doubles as a SteamVR action manifest)
/// are kept in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "Port")]
    pub port: u16,
    /// Milliseconds between controller polls.
    #[serde(rename = "PollingRate")]
    pub polling_rate: u32,
    #[serde(rename = "StickMoveTolerance")]
    pub stick_move_tolerance: u32,
    #[serde(rename = "ControllerType")]
    pub controller_type: ControllerState,
    #[serde(rename = "LeftThumb")]
    pub left_thumb: bool,
    #[serde(rename = "RightThumb")]
    pub right_thumb: bool,
    #[serde(rename = "LeftABButtons")]
    pub left_ab_buttons: bool,
    #[serde(rename = "RightABButtons")]
    pub right_ab_buttons: bool,
    pub default_bindings: Vec<DefaultBinding>,
    pub actions: Vec<Action>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Config {
    /// First binding registered for `controller_type`.
    pub fn default_binding_for(&self, controller_type: &str) -> Option<&DefaultBinding> {
        self.default_bindings
            .iter()
            .find(|b| b.controller_type == controller_type)
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// `host:port` pair for the OSC client.
    pub fn osc_target(&self) -> String {
        if self.ip.contains(':') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.polling_rate))
    }

    /// Replaces the target host and/or port, e.g. from command line flags.
    /// Nothing is changed when an override is invalid.
    pub fn apply_overrides(&mut self, overrides: &ConnectionOverrides) -> crate::error::Result<()> {
        if let Some(ip) = &overrides.ip {
            crate::config_schema::check_host("IP", ip)?;
        }
        if let Some(port) = overrides.port {
            crate::config_schema::check_port("Port", i64::from(port))?;
        }

        if let Some(ip) = &overrides.ip {
            self.ip = ip.clone();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        Ok(())
    }
}

/// Host/port replacements applied on top of a loaded document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOverrides {
    pub ip: Option<String>,
    pub port: Option<u16>,
}

/// Last known controller detection result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControllerState {
    pub enabled: bool,
    pub last_value: i64,
    /// Epoch seconds of the last sample.
    pub timestamp: i64,
}

impl ControllerState {
    pub fn controller_kind(&self) -> ControllerKind {
        ControllerKind::from_code(self.last_value)
    }

    pub fn sampled_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    /// Whether the last sample is recent enough to reuse instead of probing.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        now.timestamp().saturating_sub(self.timestamp) <= window.num_seconds()
    }

    pub fn record(&mut self, kind: ControllerKind, now: DateTime<Utc>) {
        self.last_value = kind.code();
        self.timestamp = now.timestamp();
    }
}

/// Controller family as reported by SteamVR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerKind {
    Unknown,
    /// Valve Index controllers.
    Knuckles,
    OculusTouch,
}

impl ControllerKind {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Knuckles,
            2 => Self::OculusTouch,
            _ => Self::Unknown,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Knuckles => 1,
            Self::OculusTouch => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultBinding {
    pub controller_type: String,
    pub binding_url: String,
}

/// A user mapping from one controller input to one or more OSC parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub osc_parameter: TypedValue,
    pub enabled: TypedValue,
    pub floating: TypedValue,
    pub timestamp: TypedValue,
    pub last_value: TypedValue,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Action {
    /// Boolean actions with `floating == -1` flip their value on each press.
    pub fn is_toggle(&self) -> bool {
        self.kind == ActionKind::Boolean && self.floating.as_f64() == Some(-1.0)
    }

    /// True when the action, or any of its axes, is switched on.
    pub fn is_enabled(&self) -> bool {
        match &self.enabled {
            TypedValue::Bool(b) => *b,
            TypedValue::List(items) => items.iter().any(|v| v.as_bool() == Some(true)),
            _ => false,
        }
    }

    /// Full OSC addresses this action sends to, in axis order.
    pub fn osc_addresses(&self) -> Vec<String> {
        match &self.osc_parameter {
            TypedValue::Str(p) => vec![osc_address(p)],
            TypedValue::List(items) => items
                .iter()
                .filter_map(TypedValue::as_str)
                .map(osc_address)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Turns a bare avatar parameter name into its OSC address. Values that
/// already are addresses are returned unchanged.
pub fn osc_address(parameter: &str) -> String {
    if parameter.starts_with('/') {
        parameter.to_string()
    } else {
        format!("{AVATAR_PARAMETERS_PREFIX}{parameter}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_schema::defaults;

    fn action(kind: &str, osc: TypedValue, floating: TypedValue) -> Action {
        Action {
            name: "a".into(),
            kind: ActionKind::from(kind),
            osc_parameter: osc,
            enabled: TypedValue::Bool(true),
            floating,
            timestamp: TypedValue::Int(0),
            last_value: TypedValue::Bool(false),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn first_default_binding_wins() {
        let mut config = defaults();
        config.default_bindings = vec![
            DefaultBinding { controller_type: "knuckles".into(), binding_url: "first.json".into() },
            DefaultBinding { controller_type: "knuckles".into(), binding_url: "second.json".into() },
        ];
        let hit = config.default_binding_for("knuckles").unwrap();
        assert_eq!(hit.binding_url, "first.json");
        assert!(config.default_binding_for("oculus_touch").is_none());
    }

    #[test]
    fn osc_addresses_get_avatar_prefix() {
        let a = action("vector2", TypedValue::from(vec!["StickX", "/custom/y"]), TypedValue::Float(0.0));
        assert_eq!(a.osc_addresses(), vec!["/avatar/parameters/StickX", "/custom/y"]);
    }

    #[test]
    fn toggle_only_for_boolean_minus_one() {
        assert!(action("boolean", "A".into(), TypedValue::Int(-1)).is_toggle());
        assert!(action("boolean", "A".into(), TypedValue::Float(-1.0)).is_toggle());
        assert!(!action("boolean", "A".into(), TypedValue::Float(0.5)).is_toggle());
        assert!(!action("vector1", "A".into(), TypedValue::Int(-1)).is_toggle());
    }

    #[test]
    fn enabled_when_any_axis_is_on() {
        let mut a = action("vector2", TypedValue::from(vec!["X", "Y"]), TypedValue::from(vec![0.0, 0.0]));
        a.enabled = TypedValue::from(vec![false, true]);
        assert!(a.is_enabled());
        a.enabled = TypedValue::from(vec![false, false]);
        assert!(!a.is_enabled());
        a.enabled = TypedValue::Bool(false);
        assert!(!a.is_enabled());
    }

    #[test]
    fn controller_state_freshness() {
        let now = DateTime::from_timestamp(1_000, 0).unwrap();
        let mut state = ControllerState::default();
        state.record(ControllerKind::OculusTouch, now);
        assert_eq!(state.last_value, 2);
        assert_eq!(state.controller_kind(), ControllerKind::OculusTouch);
        assert_eq!(state.sampled_at(), Some(now));

        let window = TimeDelta::seconds(CONTROLLER_REFRESH_SECS);
        assert!(state.is_fresh(now + TimeDelta::seconds(10), window));
        assert!(!state.is_fresh(now + TimeDelta::seconds(11), window));
    }

    #[test]
    fn unknown_controller_codes() {
        assert_eq!(ControllerKind::from_code(7), ControllerKind::Unknown);
        assert_eq!(ControllerKind::Knuckles.code(), 1);
    }

    #[test]
    fn overrides_are_validated_before_applying() {
        let mut config = defaults();
        let bad = ConnectionOverrides { ip: Some("not a host!".into()), port: Some(9001) };
        assert!(config.apply_overrides(&bad).is_err());
        assert_eq!(config.port, 9000);

        let good = ConnectionOverrides { ip: Some("192.168.1.20".into()), port: Some(9001) };
        config.apply_overrides(&good).unwrap();
        assert_eq!(config.osc_target(), "192.168.1.20:9001");

        let zero = ConnectionOverrides { ip: None, port: Some(0) };
        assert!(config.apply_overrides(&zero).is_err());
    }

    #[test]
    fn poll_interval_is_milliseconds() {
        let mut config = defaults();
        config.polling_rate = 20;
        assert_eq!(config.poll_interval(), Duration::from_millis(20));
    }
}
