use agentdeck_types::Language;

/// The console's display language, owned by whoever renders text.
///
/// Initialised once per process from the stored preference or the locale;
/// changed only through [`LanguagePreference::change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguagePreference {
    current: Language,
}

impl LanguagePreference {
    /// Stored preference when supported, otherwise detected from `locale`.
    #[must_use]
    pub fn initialize(stored: Option<&str>, locale: Option<&str>) -> Self {
        let current = stored
            .and_then(|code| {
                let parsed = Language::parse(code);
                if parsed.is_none() {
                    tracing::warn!(code, "Unsupported stored language; detecting from locale");
                }
                parsed
            })
            .unwrap_or_else(|| locale.map(Language::detect).unwrap_or_default());
        Self { current }
    }

    /// Locale from `LC_ALL`, then `LANG`.
    #[must_use]
    pub fn system_locale() -> Option<String> {
        ["LC_ALL", "LANG"]
            .into_iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
    }

    #[must_use]
    pub fn current(&self) -> Language {
        self.current
    }

    /// Switch language, persisting first. Returns whether anything changed.
    ///
    /// On a persist failure the previous language stays current.
    pub fn change<E>(
        &mut self,
        language: Language,
        persist: impl FnOnce(Language) -> Result<(), E>,
    ) -> Result<bool, E> {
        if self.current == language {
            return Ok(false);
        }
        persist(language)?;
        tracing::info!(from = %self.current, to = %language, "Language changed");
        self.current = language;
        Ok(true)
    }
}
