use serde::{Deserialize, Serialize};

/// Outbound proxy configuration exported to the agent process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub http_proxy: String,
    #[serde(default)]
    pub https_proxy: String,
    #[serde(default)]
    pub no_proxy: String,
    #[serde(default)]
    pub all_proxy: String,
}

impl ProxySettings {
    /// Environment variables this configuration exports; empty when disabled.
    #[must_use]
    pub fn env_pairs(&self) -> Vec<(&'static str, &str)> {
        if !self.enabled {
            return Vec::new();
        }
        [
            ("HTTP_PROXY", self.http_proxy.as_str()),
            ("HTTPS_PROXY", self.https_proxy.as_str()),
            ("NO_PROXY", self.no_proxy.as_str()),
            ("ALL_PROXY", self.all_proxy.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect()
    }
}
