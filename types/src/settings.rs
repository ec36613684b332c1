//! The agent settings document and the editable entries decoded from it.
//!
//! The document itself is kept loosely typed: the agent runtime owns its shape
//! and keys this crate does not know about must survive a save untouched.
//! Only the sections the console edits get typed views.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::EntryId;

pub const PERMISSIONS_KEY: &str = "permissions";
pub const ALLOW_KEY: &str = "allow";
pub const DENY_KEY: &str = "deny";
pub const ENV_KEY: &str = "env";
pub const HOOKS_KEY: &str = "hooks";
/// Field the selected agent installation is merged into before persisting.
pub const BINARY_PATH_KEY: &str = "binaryPath";

pub const INCLUDE_CO_AUTHORED_BY_KEY: &str = "includeCoAuthoredBy";
pub const VERBOSE_KEY: &str = "verbose";
pub const CLEANUP_PERIOD_DAYS_KEY: &str = "cleanupPeriodDays";
pub const API_KEY_HELPER_KEY: &str = "apiKeyHelper";
pub const MODEL_KEY: &str = "model";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("settings document must be a JSON object, got {found}")]
pub struct NotAnObject {
    pub found: &'static str,
}

/// Open-ended record of agent configuration keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsDocument(Map<String, Value>);

impl SettingsDocument {
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_value(value: Value) -> Result<Self, NotAnObject> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(NotAnObject {
                found: json_type_name(&other),
            }),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// `permissions` when it is an object; any other shape counts as absent.
    #[must_use]
    pub fn permissions(&self) -> Option<&Map<String, Value>> {
        self.0.get(PERMISSIONS_KEY).and_then(Value::as_object)
    }

    /// Defaults to `true`: only an explicit `false` disables attribution.
    #[must_use]
    pub fn include_co_authored_by(&self) -> bool {
        self.0.get(INCLUDE_CO_AUTHORED_BY_KEY) != Some(&Value::Bool(false))
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.0.get(VERBOSE_KEY) == Some(&Value::Bool(true))
    }

    #[must_use]
    pub fn cleanup_period_days(&self) -> Option<u64> {
        self.0.get(CLEANUP_PERIOD_DAYS_KEY).and_then(Value::as_u64)
    }

    #[must_use]
    pub fn api_key_helper(&self) -> Option<&str> {
        self.0.get(API_KEY_HELPER_KEY).and_then(Value::as_str)
    }

    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.0.get(MODEL_KEY).and_then(Value::as_str)
    }

    #[must_use]
    pub fn binary_path(&self) -> Option<&str> {
        self.0.get(BINARY_PATH_KEY).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for SettingsDocument {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<SettingsDocument> for Value {
    fn from(document: SettingsDocument) -> Self {
        document.into_value()
    }
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Which of the two disjoint permission lists a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Allow,
    Deny,
}

impl RuleKind {
    pub const ALL: [RuleKind; 2] = [RuleKind::Allow, RuleKind::Deny];

    /// Key under `permissions`; doubles as the id prefix.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Allow => ALLOW_KEY,
            Self::Deny => DENY_KEY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRule {
    pub id: EntryId,
    pub value: String,
}

impl PermissionRule {
    #[must_use]
    pub fn new(id: EntryId, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }

    /// A new, empty rule added in-session.
    #[must_use]
    pub fn blank(kind: RuleKind) -> Self {
        Self::new(EntryId::fresh(kind.key()), String::new())
    }
}

pub const ENV_ID_PREFIX: &str = "env";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentVariable {
    pub id: EntryId,
    pub key: String,
    pub value: String,
}

impl EnvironmentVariable {
    #[must_use]
    pub fn new(id: EntryId, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn blank() -> Self {
        Self::new(EntryId::fresh(ENV_ID_PREFIX), String::new(), String::new())
    }
}
