use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error};

use super::{DefaultScope, PrototypeScope, RequestScope, Scope, SessionScope, SingletonScope};
use crate::errors::ScopeErrorKind;

/// Scopes of one container by name.
///
/// Seeded with the built-in scopes, custom scopes can be added at runtime
/// and are used by the factory exactly like the built-in ones.
pub struct ScopeRegistry {
    singleton: Arc<SingletonScope>,
    prototype: Arc<PrototypeScope>,
    request: Arc<RequestScope>,
    session: Arc<SessionScope>,
    scopes: RwLock<Vec<(String, Arc<dyn Scope>)>>,
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeRegistry {
    #[must_use]
    pub fn new() -> Self {
        let singleton = Arc::new(SingletonScope::new());
        let prototype = Arc::new(PrototypeScope::new());
        let request = Arc::new(RequestScope::new());
        let session = Arc::new(SessionScope::new());

        let scopes = vec![
            (String::from(DefaultScope::Singleton), singleton.clone() as Arc<dyn Scope>),
            (String::from(DefaultScope::Prototype), prototype.clone() as Arc<dyn Scope>),
            (String::from(DefaultScope::Request), request.clone() as Arc<dyn Scope>),
            (String::from(DefaultScope::Session), session.clone() as Arc<dyn Scope>),
        ];

        Self {
            singleton,
            prototype,
            request,
            session,
            scopes: RwLock::new(scopes),
        }
    }

    #[inline]
    #[must_use]
    pub fn singleton(&self) -> &SingletonScope {
        &self.singleton
    }

    #[inline]
    #[must_use]
    pub fn prototype(&self) -> &PrototypeScope {
        &self.prototype
    }

    #[inline]
    #[must_use]
    pub fn request(&self) -> &RequestScope {
        &self.request
    }

    #[inline]
    #[must_use]
    pub fn session(&self) -> &SessionScope {
        &self.session
    }

    /// Registers a custom scope, replacing a custom scope with the same name.
    ///
    /// # Errors
    /// Returns [`ScopeErrorKind::ReservedName`] if `name` is one of the built-in scopes
    pub fn register(&self, name: impl Into<String>, scope: Arc<dyn Scope>) -> Result<(), ScopeErrorKind> {
        let name = name.into();
        if DefaultScope::from_name(&name).is_some() {
            return Err(ScopeErrorKind::ReservedName { name });
        }

        let mut scopes = self.scopes.write();
        match scopes.iter_mut().find(|(entry, _)| *entry == name) {
            Some((_, existing)) => {
                debug!(scope = name, "Custom scope replaced");
                *existing = scope;
            }
            None => {
                debug!(scope = name, "Custom scope registered");
                scopes.push((name, scope));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Scope>> {
        self.scopes
            .read()
            .iter()
            .find_map(|(entry, scope)| (entry == name).then(|| scope.clone()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.scopes.read().iter().any(|(entry, _)| entry == name)
    }

    /// Names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.scopes.read().iter().map(|(name, _)| name.clone()).collect()
    }

    /// Tears down every scope in reverse registration order.
    ///
    /// A failing scope is logged and doesn't stop the teardown of the others.
    /// Returns the failures.
    pub fn destroy_all(&self) -> Vec<ScopeErrorKind> {
        let scopes = self.scopes.read().clone();

        let mut failures = Vec::new();
        for (name, scope) in scopes.into_iter().rev() {
            debug!(scope = name, "Destroying scope");
            if let Err(err) = scope.destroy() {
                error!(scope = name, "{}", err);
                failures.push(err);
            }
        }
        failures
    }
}
