//! Configuration document for ThumbParamsOSC: where OSC messages go, how
//! often controllers are polled, and which controller inputs map to which
//! avatar parameters.

pub mod config_schema;
pub mod config_store;
pub mod config_types;
pub mod config_value;
pub mod error;

pub use config_schema::{defaults, parse, parse_str, serialize, to_string_pretty, validate, validate_action};
pub use config_types::{
    Action, Config, ConnectionOverrides, ControllerKind, ControllerState, DefaultBinding, osc_address,
};
pub use config_value::{ActionKind, TypedValue};
pub use error::SchemaError;
