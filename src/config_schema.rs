use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;

use crate::config_types::{Action, Config, ControllerState, DefaultBinding};
use crate::config_value::{ActionKind, TypedValue};
use crate::error::{Result, SchemaError};

const ROOT_KEYS: &[&str] = &[
    "IP",
    "Port",
    "PollingRate",
    "StickMoveTolerance",
    "ControllerType",
    "LeftThumb",
    "RightThumb",
    "LeftABButtons",
    "RightABButtons",
    "default_bindings",
    "actions",
];

const ACTION_KEYS: &[&str] = &[
    "name",
    "type",
    "osc_parameter",
    "enabled",
    "floating",
    "timestamp",
    "last_value",
];

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*\.?$")
        .expect("hostname pattern compiles")
});

/// Baseline configuration used when no document has been saved yet.
pub fn defaults() -> Config {
    Config {
        ip: Ipv4Addr::LOCALHOST.to_string(),
        port: 9000,
        polling_rate: 50,
        stick_move_tolerance: 0,
        controller_type: ControllerState::default(),
        left_thumb: false,
        right_thumb: false,
        left_ab_buttons: false,
        right_ab_buttons: false,
        default_bindings: Vec::new(),
        actions: Vec::new(),
        extra: BTreeMap::new(),
    }
}

/// Parses a JSON string into a validated [`Config`].
pub fn parse_str(json: &str) -> Result<Config> {
    let doc: Value = serde_json::from_str(json)?;
    parse(&doc)
}

/// Builds a validated [`Config`] from a raw document tree.
///
/// `IP`, `Port`, `PollingRate` and `StickMoveTolerance` are required. The
/// input-group flags default to `false`, `ControllerType` to a disabled
/// state and both sequences to empty. `null` counts as absent.
pub fn parse(doc: &Value) -> Result<Config> {
    let root = Fields::root(doc)?;

    let ip = root.string("IP")?;
    let port = to_u16("Port", root.int("Port")?)?;
    let polling_rate = to_u32("PollingRate", root.int("PollingRate")?)?;
    let stick_move_tolerance = to_u32("StickMoveTolerance", root.int("StickMoveTolerance")?)?;

    let controller_type = match root.optional("ControllerType") {
        Some(value) => {
            let state = Fields::object("ControllerType".to_string(), value)?;
            ControllerState {
                enabled: state.bool("enabled")?,
                last_value: state.int("last_value")?,
                timestamp: state.int("timestamp")?,
            }
        }
        None => ControllerState::default(),
    };

    let default_bindings = root
        .array("default_bindings")?
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let binding = Fields::object(format!("default_bindings[{i}]"), value)?;
            Ok(DefaultBinding {
                controller_type: binding.string("controller_type")?,
                binding_url: binding.string("binding_url")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let actions = root
        .array("actions")?
        .iter()
        .enumerate()
        .map(|(i, value)| parse_action(format!("actions[{i}]"), value))
        .collect::<Result<Vec<_>>>()?;

    let config = Config {
        ip,
        port,
        polling_rate,
        stick_move_tolerance,
        controller_type,
        left_thumb: root.bool_or("LeftThumb", false)?,
        right_thumb: root.bool_or("RightThumb", false)?,
        left_ab_buttons: root.bool_or("LeftABButtons", false)?,
        right_ab_buttons: root.bool_or("RightABButtons", false)?,
        default_bindings,
        actions,
        extra: root.extra(ROOT_KEYS),
    };

    validate(&config)?;
    Ok(config)
}

fn parse_action(path: String, value: &Value) -> Result<Action> {
    let fields = Fields::object(path, value)?;
    Ok(Action {
        name: fields.string("name")?,
        kind: ActionKind::from(fields.string("type")?.as_str()),
        osc_parameter: fields.typed("osc_parameter")?,
        enabled: fields.typed("enabled")?,
        floating: fields.typed("floating")?,
        timestamp: fields.typed("timestamp")?,
        last_value: fields.typed("last_value")?,
        extra: fields.extra(ACTION_KEYS),
    })
}

/// Writes a [`Config`] back into its document form.
pub fn serialize(config: &Config) -> Result<Value> {
    Ok(serde_json::to_value(config)?)
}

pub fn to_string_pretty(config: &Config) -> Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}

/// Checks an in-memory [`Config`], e.g. after edits and before saving.
pub fn validate(config: &Config) -> Result<()> {
    check_host("IP", &config.ip)?;
    check_port("Port", i64::from(config.port))?;
    if config.polling_rate == 0 {
        return Err(SchemaError::out_of_range("PollingRate", config.polling_rate));
    }

    for (i, binding) in config.default_bindings.iter().enumerate() {
        non_empty(&format!("default_bindings[{i}].controller_type"), &binding.controller_type)?;
        non_empty(&format!("default_bindings[{i}].binding_url"), &binding.binding_url)?;
    }

    check_extra_keys("", &config.extra, ROOT_KEYS)?;

    let mut seen = HashSet::new();
    for (i, action) in config.actions.iter().enumerate() {
        let path = format!("actions[{i}]");
        validate_action_at(&path, action)?;
        check_extra_keys(&path, &action.extra, ACTION_KEYS)?;
        if !seen.insert(action.name.as_str()) {
            return Err(SchemaError::DuplicateName {
                field: format!("{path}.name"),
                name: action.name.clone(),
            });
        }
    }

    Ok(())
}

/// Checks a single action against the coercion rules of its kind.
/// Error paths are rooted at `action`.
pub fn validate_action(action: &Action) -> Result<()> {
    validate_action_at("action", action)?;
    check_extra_keys("action", &action.extra, ACTION_KEYS)
}

/// Extra keys are flattened next to the typed fields on output, so a key
/// named like one of them would overwrite it.
fn check_extra_keys(path: &str, extra: &BTreeMap<String, Value>, known: &[&str]) -> Result<()> {
    match extra.keys().find(|k| known.contains(&k.as_str())) {
        Some(key) if path.is_empty() => Err(SchemaError::ReservedKey(key.clone())),
        Some(key) => Err(SchemaError::ReservedKey(format!("{path}.{key}"))),
        None => Ok(()),
    }
}

fn validate_action_at(path: &str, action: &Action) -> Result<()> {
    let field = |name: &str| format!("{path}.{name}");

    non_empty(&field("name"), &action.name)?;
    non_empty(&field("type"), action.kind.as_str())?;

    match &action.kind {
        ActionKind::Boolean => {
            expect_parameter(&field("osc_parameter"), &action.osc_parameter)?;
            expect_bool(&field("enabled"), &action.enabled)?;
            let floating = expect_number(&field("floating"), &action.floating)?;
            // -1 marks a toggle
            if floating < 0.0 && floating != -1.0 {
                return Err(SchemaError::out_of_range(field("floating"), floating));
            }
            expect_number(&field("timestamp"), &action.timestamp)?;
            expect_bool(&field("last_value"), &action.last_value)?;
        }
        ActionKind::Vector1 => {
            expect_parameter(&field("osc_parameter"), &action.osc_parameter)?;
            expect_bool(&field("enabled"), &action.enabled)?;
            expect_non_negative(&field("floating"), &action.floating)?;
            expect_number(&field("timestamp"), &action.timestamp)?;
            expect_number(&field("last_value"), &action.last_value)?;
        }
        ActionKind::Vector2 => {
            let params = expect_list(&field("osc_parameter"), &action.osc_parameter, 2, 3)?;
            for_each(&field("osc_parameter"), params, expect_parameter)?;
            let axes = params.len();

            let enabled = expect_list(&field("enabled"), &action.enabled, axes, axes)?;
            for_each(&field("enabled"), enabled, |f, v| expect_bool(f, v).map(drop))?;

            let floating = expect_list(&field("floating"), &action.floating, axes, axes)?;
            for_each(&field("floating"), floating, |f, v| expect_non_negative(f, v).map(drop))?;

            let timestamp = expect_list(&field("timestamp"), &action.timestamp, 2, axes)?;
            for_each(&field("timestamp"), timestamp, |f, v| expect_number(f, v).map(drop))?;

            let last_value = expect_list(&field("last_value"), &action.last_value, 2, 3)?;
            for_each(&field("last_value"), last_value, expect_bool_or_number)?;
        }
        ActionKind::Other(name) => {
            // a known name would be read back as its strict kind
            if !matches!(ActionKind::from(name.as_str()), ActionKind::Other(_)) {
                return Err(SchemaError::out_of_range(field("type"), format!("{name:?}")));
            }
            one_or_many(&field("osc_parameter"), &action.osc_parameter, expect_parameter)?;
            one_or_many(&field("enabled"), &action.enabled, |f, v| expect_bool(f, v).map(drop))?;
            one_or_many(&field("floating"), &action.floating, |f, v| expect_number(f, v).map(drop))?;
            one_or_many(&field("timestamp"), &action.timestamp, |f, v| expect_number(f, v).map(drop))?;
            one_or_many(&field("last_value"), &action.last_value, expect_bool_or_number)?;
        }
    }

    Ok(())
}

/// Accepts IPv4/IPv6 literals and RFC 1123 host names. Reachability is not
/// checked.
pub(crate) fn check_host(field: &str, host: &str) -> Result<()> {
    non_empty(field, host)?;
    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    // all-numeric names must be real IPv4 addresses
    let numeric = host.chars().all(|c| c.is_ascii_digit() || c == '.');
    if numeric || host.len() > 253 || !HOSTNAME.is_match(host) {
        return Err(SchemaError::out_of_range(field, host));
    }
    Ok(())
}

pub(crate) fn check_port(field: &str, port: i64) -> Result<()> {
    to_u16(field, port).map(drop)
}

fn to_u16(field: &str, value: i64) -> Result<u16> {
    match u16::try_from(value) {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(SchemaError::out_of_range(field, value)),
    }
}

fn to_u32(field: &str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| SchemaError::out_of_range(field, value))
}

fn non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SchemaError::out_of_range(field, format!("{value:?}")));
    }
    Ok(())
}

fn expect_bool(field: &str, value: &TypedValue) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| SchemaError::type_mismatch(field, "bool"))
}

fn expect_number(field: &str, value: &TypedValue) -> Result<f64> {
    let n = value
        .as_f64()
        .ok_or_else(|| SchemaError::type_mismatch(field, "number"))?;
    if !n.is_finite() {
        return Err(SchemaError::out_of_range(field, n));
    }
    Ok(n)
}

fn expect_non_negative(field: &str, value: &TypedValue) -> Result<f64> {
    let n = expect_number(field, value)?;
    if n < 0.0 {
        return Err(SchemaError::out_of_range(field, n));
    }
    Ok(n)
}

fn expect_parameter(field: &str, value: &TypedValue) -> Result<()> {
    let parameter = value
        .as_str()
        .ok_or_else(|| SchemaError::type_mismatch(field, "string"))?;
    non_empty(field, parameter)
}

fn expect_bool_or_number(field: &str, value: &TypedValue) -> Result<()> {
    if !value.is_bool_or_number() {
        return Err(SchemaError::type_mismatch(field, "bool or number"));
    }
    if let TypedValue::Float(f) = value {
        if !f.is_finite() {
            return Err(SchemaError::out_of_range(field, f));
        }
    }
    Ok(())
}

fn expect_list<'a>(field: &str, value: &'a TypedValue, min: usize, max: usize) -> Result<&'a [TypedValue]> {
    let items = value
        .as_list()
        .ok_or_else(|| SchemaError::type_mismatch(field, "list"))?;
    if items.len() < min || items.len() > max {
        return Err(SchemaError::out_of_range(field, format!("{} elements", items.len())));
    }
    Ok(items)
}

fn for_each(field: &str, items: &[TypedValue], check: impl Fn(&str, &TypedValue) -> Result<()>) -> Result<()> {
    items
        .iter()
        .enumerate()
        .try_for_each(|(i, item)| check(&format!("{field}[{i}]"), item))
}

fn one_or_many(field: &str, value: &TypedValue, check: impl Fn(&str, &TypedValue) -> Result<()>) -> Result<()> {
    match value {
        TypedValue::List(items) => for_each(field, items, check),
        single => check(field, single),
    }
}

/// Typed access to the keys of one JSON object, producing field paths for errors.
struct Fields<'a> {
    path: String,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn root(doc: &'a Value) -> Result<Self> {
        Self::object(String::new(), doc)
    }

    fn object(path: String, value: &'a Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self { path, map }),
            _ => {
                let field = if path.is_empty() { "<root>".to_string() } else { path };
                Err(SchemaError::type_mismatch(field, "object"))
            }
        }
    }

    fn path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    fn optional(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn required(&self, key: &str) -> Result<&'a Value> {
        self.optional(key)
            .ok_or_else(|| SchemaError::MissingField(self.path(key)))
    }

    fn string(&self, key: &str) -> Result<String> {
        self.required(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SchemaError::type_mismatch(self.path(key), "string"))
    }

    fn int(&self, key: &str) -> Result<i64> {
        match self.required(key)? {
            Value::Number(n) if n.is_i64() || n.is_u64() => n
                .as_i64()
                .ok_or_else(|| SchemaError::out_of_range(self.path(key), n)),
            _ => Err(SchemaError::type_mismatch(self.path(key), "integer")),
        }
    }

    fn bool(&self, key: &str) -> Result<bool> {
        self.required(key)?
            .as_bool()
            .ok_or_else(|| SchemaError::type_mismatch(self.path(key), "bool"))
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.optional(key) {
            Some(_) => self.bool(key),
            None => Ok(default),
        }
    }

    fn array(&self, key: &str) -> Result<&'a [Value]> {
        match self.optional(key) {
            Some(Value::Array(items)) => Ok(items.as_slice()),
            Some(_) => Err(SchemaError::type_mismatch(self.path(key), "array")),
            None => Ok(&[][..]),
        }
    }

    fn typed(&self, key: &str) -> Result<TypedValue> {
        TypedValue::from_json(&self.path(key), self.required(key)?)
    }

    fn extra(&self, known: &[&str]) -> BTreeMap<String, Value> {
        self.map
            .iter()
            .filter(|(k, _)| !known.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
