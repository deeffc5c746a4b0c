use tracing::debug;

use super::{
    store::{run_removal_callback, PartitionedStore},
    DefaultScope, DestructionCallback, Scope,
};
use crate::{
    any::Bean,
    context::{self, ConversationGuard},
    errors::{ResolveErrorKind, ScopeErrorKind},
};

/// One instance per external session.
///
/// The caller establishes the current session of a unit of work with [`SessionScope::enter`]
/// or [`SessionScope::set_current_session`] before resolving session beans.
/// The session id is held per thread, so it never leaks into other units of work.
pub struct SessionScope {
    id: u64,
    store: PartitionedStore,
}

impl Default for SessionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionScope {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: context::next_instance_id(),
            store: PartitionedStore::new(),
        }
    }

    /// Makes `session_id` the current session of this thread until the guard is dropped
    pub fn enter(&self, session_id: impl Into<String>) -> ConversationGuard {
        ConversationGuard::enter(self.id, session_id)
    }

    /// Sets the current session of this thread, returning the previous one
    pub fn set_current_session(&self, session_id: impl Into<String>) -> Option<String> {
        context::set(self.id, session_id)
    }

    pub fn clear_current_session(&self) -> Option<String> {
        context::clear(self.id)
    }

    #[must_use]
    pub fn current_session(&self) -> Option<String> {
        context::current(self.id)
    }

    fn require_session(&self) -> Result<String, ScopeErrorKind> {
        self.current_session().ok_or(ScopeErrorKind::NoSession)
    }

    /// Tears down the partition of one session
    ///
    /// # Errors
    /// Returns [`ScopeErrorKind::Teardown`] if some destruction callbacks failed
    pub fn destroy_session(&self, session_id: &str) -> Result<(), ScopeErrorKind> {
        debug!(session_id, "Destroying session");
        self.store.destroy_partition(DefaultScope::Session.name(), session_id)
    }

    /// Adds a listener called with the id of every torn down session, after its destruction callbacks ran
    pub fn on_session_destroyed(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.store.on_partition_destroyed(listener);
    }

    #[must_use]
    pub fn is_active(&self, session_id: &str) -> bool {
        self.store.contains_partition(session_id)
    }
}

impl Scope for SessionScope {
    fn get(
        &self,
        name: &str,
        factory: &mut dyn FnMut() -> Result<Bean, ResolveErrorKind>,
    ) -> Result<Bean, ResolveErrorKind> {
        let session_id = self.require_session()?;
        self.store.get_or_create(&session_id, name, factory)
    }

    fn remove(&self, name: &str) -> Option<Bean> {
        let session_id = self.current_session()?;
        let (bean, callback) = self.store.take(&session_id, name);
        run_removal_callback(DefaultScope::Session.name(), name, callback);
        bean
    }

    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback) -> Result<(), ScopeErrorKind> {
        let session_id = self.require_session()?;
        self.store.register_destruction_callback(&session_id, name, callback);
        Ok(())
    }

    fn conversation_id(&self) -> Option<String> {
        self.current_session()
    }

    fn destroy(&self) -> Result<(), ScopeErrorKind> {
        debug!("Destroying all sessions");
        self.store.destroy_all(DefaultScope::Session.name())
    }
}
