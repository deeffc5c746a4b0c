use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

use super::{DestructionCallback, Scope};
use crate::{
    any::Bean,
    errors::{ResolveErrorKind, ScopeErrorKind},
};

/// A new instance on every request.
///
/// The container doesn't own prototype instances after handing them out:
/// destruction callbacks are accepted, counted and dropped without being invoked,
/// and teardown has nothing to discard.
#[derive(Default)]
pub struct PrototypeScope {
    registered_callbacks: Mutex<HashMap<String, usize>>,
}

impl PrototypeScope {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of destruction callbacks registered for `name` so far
    #[must_use]
    pub fn registered_callbacks(&self, name: &str) -> usize {
        self.registered_callbacks.lock().get(name).copied().unwrap_or(0)
    }
}

impl Scope for PrototypeScope {
    fn get(
        &self,
        _name: &str,
        factory: &mut dyn FnMut() -> Result<Bean, ResolveErrorKind>,
    ) -> Result<Bean, ResolveErrorKind> {
        debug!("Creating new instance");
        factory()
    }

    fn remove(&self, _name: &str) -> Option<Bean> {
        None
    }

    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback) -> Result<(), ScopeErrorKind> {
        debug!(bean = name, "Destruction callback of a prototype won't be invoked by the container");
        *self.registered_callbacks.lock().entry(name.to_owned()).or_default() += 1;
        drop(callback);
        Ok(())
    }

    fn conversation_id(&self) -> Option<String> {
        None
    }
}
