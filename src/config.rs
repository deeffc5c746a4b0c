use std::collections::BTreeSet;

/// Config for a bean factory
/// ## Fields
/// - `active_profiles`:
///   Profiles enabled for this container.
///   A definition that declares profiles is registered only if one of them is active,
///   a definition without profiles is always eligible.
///
/// - `validate_on_refresh`:
///   If `true`, [`crate::Container::refresh`] checks the whole dependency graph for cycles
///   before the container becomes active.
///
/// - `preinstantiate_singletons`:
///   If `true`, [`crate::Container::refresh`] creates every non-lazy singleton in dependency order.
///   Otherwise all beans are created on first access.
#[derive(Clone, Debug)]
pub struct Config {
    pub active_profiles: BTreeSet<String>,
    pub validate_on_refresh: bool,
    pub preinstantiate_singletons: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            active_profiles: BTreeSet::new(),
            validate_on_refresh: true,
            preinstantiate_singletons: false,
        }
    }
}

impl Config {
    #[inline]
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.active_profiles.insert(profile.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn preinstantiate(mut self, preinstantiate_singletons: bool) -> Self {
        self.preinstantiate_singletons = preinstantiate_singletons;
        self
    }

    #[inline]
    #[must_use]
    pub fn validate_on_refresh(mut self, validate_on_refresh: bool) -> Self {
        self.validate_on_refresh = validate_on_refresh;
        self
    }
}
