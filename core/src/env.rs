//! `env` object <-> editable key/value list.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use agentdeck_types::settings::ENV_ID_PREFIX;
use agentdeck_types::{EntryId, EnvironmentVariable, json_type_name};

/// Decode a raw `env` object into an ordered list with positional ids.
///
/// Only a JSON object is accepted; arrays, scalars and a missing value yield an
/// empty list. Scalar values are rendered as text.
#[must_use]
pub fn decode_env(raw: Option<&Value>) -> Vec<EnvironmentVariable> {
    let map = match raw {
        None => return Vec::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            warn!(
                found = json_type_name(other),
                "Environment section is not an object; treating as empty"
            );
            return Vec::new();
        }
    };

    map.iter()
        .enumerate()
        .map(|(index, (key, value))| {
            EnvironmentVariable::new(
                EntryId::positional(ENV_ID_PREFIX, index),
                key.clone(),
                env_text(key, value),
            )
        })
        .collect()
}

fn env_text(key: &str, value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        other => {
            warn!(key, found = json_type_name(other), "Coercing structured env value to text");
            other.to_string()
        }
    }
}

/// Encode the list into the persisted `env` map.
///
/// Entries whose key or value is blank after trimming are skipped. When a key
/// repeats, the later entry wins.
#[must_use]
pub fn encode_env(vars: &[EnvironmentVariable]) -> Map<String, Value> {
    let mut map = Map::new();
    for var in vars {
        if var.key.trim().is_empty() || var.value.trim().is_empty() {
            continue;
        }
        if map
            .insert(var.key.clone(), Value::String(var.value.clone()))
            .is_some()
        {
            debug!(key = %var.key, "Duplicate env key; keeping the last value");
        }
    }
    map
}
