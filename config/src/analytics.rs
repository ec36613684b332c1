use crate::AnalyticsConfig;

/// Result of asking to turn analytics on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableOutcome {
    Enabled,
    AlreadyEnabled,
    /// Nothing was changed; consent has to be granted first.
    ConsentRequired,
}

/// Analytics switch gated behind explicit consent.
///
/// Every transition persists first and only then updates the in-memory
/// state, so a failed write leaves the preference as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalyticsPreference {
    enabled: bool,
    consented: bool,
}

impl AnalyticsPreference {
    /// A stored `enabled` without consent is read as disabled.
    #[must_use]
    pub fn from_config(config: AnalyticsConfig) -> Self {
        if config.enabled && !config.consented {
            tracing::warn!("Analytics enabled without consent; treating as disabled");
        }
        Self {
            enabled: config.enabled && config.consented,
            consented: config.consented,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn consented(&self) -> bool {
        self.consented
    }

    fn config(enabled: bool, consented: bool) -> AnalyticsConfig {
        AnalyticsConfig { enabled, consented }
    }

    /// Turn analytics on, if consent was already given.
    pub fn enable<E>(
        &mut self,
        persist: impl FnOnce(AnalyticsConfig) -> Result<(), E>,
    ) -> Result<EnableOutcome, E> {
        if !self.consented {
            return Ok(EnableOutcome::ConsentRequired);
        }
        if self.enabled {
            return Ok(EnableOutcome::AlreadyEnabled);
        }
        persist(Self::config(true, true))?;
        self.enabled = true;
        tracing::info!("Analytics enabled");
        Ok(EnableOutcome::Enabled)
    }

    /// Record consent and turn analytics on in one write.
    pub fn consent_and_enable<E>(
        &mut self,
        persist: impl FnOnce(AnalyticsConfig) -> Result<(), E>,
    ) -> Result<(), E> {
        if self.consented && self.enabled {
            return Ok(());
        }
        persist(Self::config(true, true))?;
        self.consented = true;
        self.enabled = true;
        tracing::info!("Analytics consent granted");
        Ok(())
    }

    /// Turn analytics off. Consent is kept. Returns whether anything changed.
    pub fn disable<E>(
        &mut self,
        persist: impl FnOnce(AnalyticsConfig) -> Result<(), E>,
    ) -> Result<bool, E> {
        if !self.enabled {
            return Ok(false);
        }
        persist(Self::config(false, self.consented))?;
        self.enabled = false;
        tracing::info!("Analytics disabled");
        Ok(true)
    }

    /// Drop collected data and withdraw consent.
    ///
    /// `delete` receives no settings: the stored preference is removed, not
    /// rewritten.
    pub fn delete_data<E>(&mut self, delete: impl FnOnce() -> Result<(), E>) -> Result<(), E> {
        delete()?;
        *self = Self::default();
        tracing::info!("Analytics data deleted and consent withdrawn");
        Ok(())
    }
}
