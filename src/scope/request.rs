use std::thread;
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

/// One instance per unit of work.
///
/// The partition key is the request id entered on the calling thread with [`RequestScope::enter`],
/// so units of work multiplexed on one thread stay isolated.
/// Without an entered id the calling thread's identity is used.
pub struct RequestScope {
    id: u64,
    store: PartitionedStore,
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestScope {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: context::next_instance_id(),
            store: PartitionedStore::new(),
        }
    }

    /// Makes `request_id` the current request of this thread until the guard is dropped
    pub fn enter(&self, request_id: impl Into<String>) -> ConversationGuard {
        ConversationGuard::enter(self.id, request_id)
    }

    /// Current request id: the entered one, or the identity of the calling thread
    #[must_use]
    pub fn current_request(&self) -> String {
        context::current(self.id).unwrap_or_else(|| format!("{:?}", thread::current().id()))
    }

    /// Tears down the partition of the current request
    ///
    /// # Errors
    /// Returns [`ScopeErrorKind::Teardown`] if some destruction callbacks failed
    pub fn destroy_current(&self) -> Result<(), ScopeErrorKind> {
        self.destroy_request(&self.current_request())
    }

    /// # Errors
    /// Returns [`ScopeErrorKind::Teardown`] if some destruction callbacks failed
    pub fn destroy_request(&self, request_id: &str) -> Result<(), ScopeErrorKind> {
        debug!(request_id, "Destroying request");
        self.store.destroy_partition(DefaultScope::Request.name(), request_id)
    }

    /// Adds a listener called with the id of every torn down request, after its destruction callbacks ran
    pub fn on_request_destroyed(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.store.on_partition_destroyed(listener);
    }

    #[must_use]
    pub fn is_active(&self, request_id: &str) -> bool {
        self.store.contains_partition(request_id)
    }
}

impl Scope for RequestScope {
    fn get(
        &self,
        name: &str,
        factory: &mut dyn FnMut() -> Result<Bean, ResolveErrorKind>,
    ) -> Result<Bean, ResolveErrorKind> {
        self.store.get_or_create(&self.current_request(), name, factory)
    }

    fn remove(&self, name: &str) -> Option<Bean> {
        let (bean, callback) = self.store.take(&self.current_request(), name);
        run_removal_callback(DefaultScope::Request.name(), name, callback);
        bean
    }

    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback) -> Result<(), ScopeErrorKind> {
        self.store
            .register_destruction_callback(&self.current_request(), name, callback);
        Ok(())
    }

    fn conversation_id(&self) -> Option<String> {
        Some(self.current_request())
    }

    fn destroy(&self) -> Result<(), ScopeErrorKind> {
        debug!("Destroying all requests");
        self.store.destroy_all(DefaultScope::Request.name())
    }
}

#[cfg(test)]
mod tests {
    use super::RequestScope;
    use crate::{
        any::Bean,
        errors::{InstantiateErrorKind, ResolveErrorKind},
        scope::Scope,
    };

    use core::sync::atomic::{AtomicU8, Ordering};
    use std::{sync::Arc, thread};
    use tracing_test::traced_test;

    fn new_bean() -> Result<Bean, ResolveErrorKind> {
        Ok(Arc::new(()))
    }

    #[test]
    #[traced_test]
    fn test_same_unit_of_work_shares_instance() {
        let scope = RequestScope::new();
        let _request = scope.enter("req-1");

        let first = scope.get("a", &mut new_bean).unwrap();
        let second = scope.get("a", &mut new_bean).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(scope.conversation_id().as_deref(), Some("req-1"));
    }

    #[test]
    #[traced_test]
    fn test_requests_on_one_thread_are_isolated() {
        let scope = RequestScope::new();

        let first = {
            let _request = scope.enter("req-1");
            scope.get("a", &mut new_bean).unwrap()
        };
        let second = {
            let _request = scope.enter("req-2");
            scope.get("a", &mut new_bean).unwrap()
        };

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(scope.is_active("req-1"));
        assert!(scope.is_active("req-2"));
    }

    #[test]
    #[traced_test]
    fn test_threads_are_isolated() {
        let scope = RequestScope::new();
        let here = scope.get("a", &mut new_bean).unwrap();

        let there = thread::scope(|s| {
            s.spawn(|| {
                let first = scope.get("a", &mut new_bean).unwrap();
                let second = scope.get("a", &mut new_bean).unwrap();
                assert!(Arc::ptr_eq(&first, &second));
                first
            })
            .join()
            .unwrap()
        });

        assert!(!Arc::ptr_eq(&here, &there));
    }

    #[test]
    #[traced_test]
    fn test_destroy_current_only() {
        let scope = RequestScope::new();
        let destroyed = Arc::new(AtomicU8::new(0));

        for request_id in ["req-1", "req-2"] {
            let _request = scope.enter(request_id);
            scope.get("a", &mut new_bean).unwrap();

            let destroyed = destroyed.clone();
            scope
                .register_destruction_callback(
                    "a",
                    Box::new(move || -> Result<(), InstantiateErrorKind> {
                        destroyed.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                )
                .unwrap();
        }

        {
            let _request = scope.enter("req-1");
            scope.destroy_current().unwrap();
        }
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(!scope.is_active("req-1"));
        assert!(scope.is_active("req-2"));

        scope.destroy().unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
        assert!(!scope.is_active("req-2"));
    }
}
