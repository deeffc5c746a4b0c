use parking_lot::{Mutex, ReentrantMutex};
use tracing::debug;

use super::{
    store::{run_destruction_callbacks, run_removal_callback, ScopeStore},
    DefaultScope, DestructionCallback, Scope,
};
use crate::{
    any::Bean,
    errors::{ResolveErrorKind, ScopeErrorKind},
};

/// One process-wide instance per bean.
///
/// Creation is serialized by a reentrant lock: a caller arriving while another thread creates a bean
/// waits and gets the stored instance, so each bean is constructed at most once.
/// The lock is reentrant because creating a singleton resolves its singleton dependencies on the same thread.
#[derive(Default)]
pub struct SingletonScope {
    store: Mutex<ScopeStore>,
    creation: ReentrantMutex<()>,
}

impl SingletonScope {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.store.lock().contains(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }
}

impl Scope for SingletonScope {
    fn get(
        &self,
        name: &str,
        factory: &mut dyn FnMut() -> Result<Bean, ResolveErrorKind>,
    ) -> Result<Bean, ResolveErrorKind> {
        if let Some(bean) = self.store.lock().get(name) {
            debug!("Found in cache");
            return Ok(bean);
        }

        let _creation = self.creation.lock();
        if let Some(bean) = self.store.lock().get(name) {
            debug!("Found in cache after waiting for creation");
            return Ok(bean);
        }
        debug!("Not found in cache");

        let bean = factory()?;
        self.store.lock().insert(name, bean.clone());
        Ok(bean)
    }

    fn remove(&self, name: &str) -> Option<Bean> {
        let (bean, callback) = self.store.lock().take(name);
        run_removal_callback(DefaultScope::Singleton.name(), name, callback);
        bean
    }

    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback) -> Result<(), ScopeErrorKind> {
        self.store.lock().register_destruction_callback(name, callback);
        Ok(())
    }

    fn conversation_id(&self) -> Option<String> {
        None
    }

    fn destroy(&self) -> Result<(), ScopeErrorKind> {
        let callbacks = self.store.lock().drain();
        debug!(callbacks = callbacks.len(), "Destroying singletons");
        run_destruction_callbacks(DefaultScope::Singleton.name(), callbacks)
    }
}
