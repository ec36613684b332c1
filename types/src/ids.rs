use std::fmt;

use uuid::Uuid;

/// Presentation-only identity for an entry of an editable list.
///
/// Never persisted. Two constructors exist and they cannot collide:
/// positional ids (`allow-0`) are only minted while decoding a freshly loaded
/// list, fresh ids (`allow-6f0c…`) for every entry added afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryId(String);

impl EntryId {
    #[must_use]
    pub fn positional(prefix: &str, index: usize) -> Self {
        Self(format!("{prefix}-{index}"))
    }

    #[must_use]
    pub fn fresh(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", Uuid::new_v4().simple()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
