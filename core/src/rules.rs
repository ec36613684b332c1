//! `permissions.allow` / `permissions.deny` <-> editable rule lists.

use serde_json::Value;
use tracing::warn;

use agentdeck_types::{EntryId, PermissionRule, RuleKind, json_type_name};

/// Decode a raw rule array into an ordered list with positional ids.
///
/// Anything that is not an array (including a missing value) yields an empty
/// list. Non-string elements are coerced to text rather than dropped so that
/// positions stay stable.
#[must_use]
pub fn decode_rules(kind: RuleKind, raw: Option<&Value>) -> Vec<PermissionRule> {
    let items = match raw {
        None => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            warn!(
                list = kind.key(),
                found = json_type_name(other),
                "Permission rules are not an array; treating as empty"
            );
            return Vec::new();
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            PermissionRule::new(EntryId::positional(kind.key(), index), rule_text(kind, item))
        })
        .collect()
}

fn rule_text(kind: RuleKind, item: &Value) -> String {
    match item {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => {
            warn!(
                list = kind.key(),
                found = json_type_name(other),
                "Coercing non-string permission rule"
            );
            other.to_string()
        }
    }
}

/// Encode a rule list back into its raw array.
///
/// Blank and whitespace-only rules are dropped; order and duplicates are kept.
/// Values are written as entered, not trimmed.
#[must_use]
pub fn encode_rules(rules: &[PermissionRule]) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| !rule.value.trim().is_empty())
        .map(|rule| rule.value.clone())
        .collect()
}
