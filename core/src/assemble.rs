//! Rebuild the settings document from its edited lists.

use serde_json::{Map, Value};

use agentdeck_types::settings::{ALLOW_KEY, DENY_KEY, ENV_KEY, PERMISSIONS_KEY};
use agentdeck_types::{EnvironmentVariable, PermissionRule, SettingsDocument};

use crate::{encode_env, encode_rules};

/// Build the document to persist from the loaded base and the edited lists.
///
/// Exactly `permissions.allow`, `permissions.deny` and `env` are replaced.
/// Every other top-level key, and every other key inside an object-shaped
/// `permissions`, is carried over unchanged.
#[must_use]
pub fn assemble(
    base: &SettingsDocument,
    allow: &[PermissionRule],
    deny: &[PermissionRule],
    env: &[EnvironmentVariable],
) -> SettingsDocument {
    let mut document = base.clone();

    let mut permissions = base.permissions().cloned().unwrap_or_else(Map::new);
    permissions.insert(ALLOW_KEY.to_string(), Value::from(encode_rules(allow)));
    permissions.insert(DENY_KEY.to_string(), Value::from(encode_rules(deny)));
    document.insert(PERMISSIONS_KEY, Value::Object(permissions));
    document.insert(ENV_KEY, Value::Object(encode_env(env)));

    document
}
