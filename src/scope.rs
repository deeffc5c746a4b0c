mod prototype;
mod registry;
mod request;
mod session;
mod singleton;
mod store;

pub use prototype::PrototypeScope;
pub use registry::ScopeRegistry;
pub use request::RequestScope;
pub use session::SessionScope;
pub use singleton::SingletonScope;
pub use store::{run_destruction_callbacks, PartitionListener, PartitionedStore, ScopeStore};

use core::fmt::{self, Display, Formatter};

use crate::{
    any::Bean,
    errors::{InstantiateErrorKind, ResolveErrorKind, ScopeErrorKind},
};

/// Callback run when a scoped instance is discarded
pub type DestructionCallback = Box<dyn FnOnce() -> Result<(), InstantiateErrorKind> + Send>;

/// Caching policy of a bean.
///
/// The factory asks the scope of a definition for an instance, passing the creation pipeline as `factory`.
/// The scope decides whether to return a cached instance or to create a new one,
/// and keeps destruction callbacks until the cached instances are discarded.
/// Any implementation can be registered in [`ScopeRegistry`] under a custom name.
pub trait Scope: Send + Sync {
    /// Returns the cached instance of `name`, or creates one with `factory`.
    ///
    /// # Errors
    /// Returns the error of `factory`, or a scope usage error
    fn get(
        &self,
        name: &str,
        factory: &mut dyn FnMut() -> Result<Bean, ResolveErrorKind>,
    ) -> Result<Bean, ResolveErrorKind>;

    /// Removes the cached instance of `name`, if any
    fn remove(&self, name: &str) -> Option<Bean>;

    /// # Errors
    /// Returns a scope usage error if the scope can't accept the callback in the current context
    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback) -> Result<(), ScopeErrorKind>;

    /// Id of the current partition, `None` for process-wide scopes
    fn conversation_id(&self) -> Option<String>;

    /// Discards all cached instances, running their destruction callbacks
    ///
    /// # Errors
    /// Returns [`ScopeErrorKind::Teardown`] if some callbacks failed. The rest of them still run
    fn destroy(&self) -> Result<(), ScopeErrorKind> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DefaultScope {
    Singleton,
    Prototype,
    Request,
    Session,
}

impl DefaultScope {
    pub const ALL: [DefaultScope; 4] = [
        DefaultScope::Singleton,
        DefaultScope::Prototype,
        DefaultScope::Request,
        DefaultScope::Session,
    ];

    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            DefaultScope::Singleton => "singleton",
            DefaultScope::Prototype => "prototype",
            DefaultScope::Request => "request",
            DefaultScope::Session => "session",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scope| scope.name() == name)
    }
}

impl Display for DefaultScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<DefaultScope> for String {
    #[inline]
    fn from(scope: DefaultScope) -> Self {
        scope.name().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::DefaultScope;

    #[test]
    fn test_default_scope_names() {
        for scope in DefaultScope::ALL {
            assert_eq!(DefaultScope::from_name(scope.name()), Some(scope));
        }
        assert_eq!(DefaultScope::from_name("thread"), None);
        assert_eq!(String::from(DefaultScope::Request), "request");
    }
}
