use std::fmt;

/// An auxiliary settings section with its own edit buffer and commit step.
///
/// Declaration order is the commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    Hooks,
    Proxy,
    BinaryPath,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Hooks, Section::Proxy, Section::BinaryPath];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hooks => "hooks",
            Self::Proxy => "proxy",
            Self::BinaryPath => "binary_path",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
