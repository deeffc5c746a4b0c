use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::DestructionCallback;
use crate::{
    any::Bean,
    errors::{ResolveErrorKind, ScopeErrorKind},
};

/// Instances and destruction callbacks of one scope partition.
///
/// Remembers the creation order of its instances, a teardown discards them last created, first destroyed.
#[derive(Default)]
pub struct ScopeStore {
    objects: HashMap<String, Bean>,
    order: Vec<String>,
    callbacks: HashMap<String, DestructionCallback>,
}

impl ScopeStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Bean> {
        self.objects.get(name).cloned()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.callbacks.is_empty()
    }

    pub fn insert(&mut self, name: impl Into<String>, bean: Bean) -> Option<Bean> {
        let name = name.into();
        let previous = self.objects.insert(name.clone(), bean);
        if previous.is_none() {
            self.order.push(name);
        }
        previous
    }

    /// Registers the callback of `name`, replacing the previous one
    pub fn register_destruction_callback(&mut self, name: impl Into<String>, callback: DestructionCallback) {
        self.callbacks.insert(name.into(), callback);
    }

    /// Takes the instance of `name` out of the store together with its callback.
    /// The callback isn't run, it's up to the caller to do it outside of any lock
    pub fn take(&mut self, name: &str) -> (Option<Bean>, Option<DestructionCallback>) {
        let bean = self.objects.remove(name);
        if bean.is_some() {
            self.order.retain(|entry| entry != name);
        }
        (bean, self.callbacks.remove(name))
    }

    /// Empties the store, returning callbacks in teardown order.
    ///
    /// Callbacks of instances come in reverse creation order,
    /// callbacks registered for names that were never stored come last.
    pub fn drain(&mut self) -> Vec<(String, DestructionCallback)> {
        let mut callbacks = Vec::with_capacity(self.callbacks.len());
        for name in self.order.drain(..).rev() {
            if let Some(callback) = self.callbacks.remove(&name) {
                callbacks.push((name, callback));
            }
        }

        let mut orphaned = self.callbacks.drain().collect::<Vec<_>>();
        orphaned.sort_by(|(left, _), (right, _)| left.cmp(right));
        callbacks.extend(orphaned);

        self.objects.clear();
        callbacks
    }
}

/// Runs destruction callbacks in the given order.
///
/// A failing callback is logged and doesn't stop the rest of them.
///
/// # Errors
/// Returns [`ScopeErrorKind::Teardown`] with the names of the failed callbacks
pub fn run_destruction_callbacks(scope: &str, callbacks: Vec<(String, DestructionCallback)>) -> Result<(), ScopeErrorKind> {
    let mut failed = Vec::new();
    for (name, callback) in callbacks {
        debug!(scope, bean = name, "Running destruction callback");
        if let Err(err) = callback() {
            warn!(scope, bean = name, "Destruction callback failed: {}", err);
            failed.push(name);
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(ScopeErrorKind::Teardown {
            scope: scope.to_owned(),
            failed,
        })
    }
}

/// Runs the callback of a single removed instance, logging a failure
pub(crate) fn run_removal_callback(scope: &str, name: &str, callback: Option<DestructionCallback>) {
    if let Some(callback) = callback {
        debug!(scope, bean = name, "Running destruction callback");
        if let Err(err) = callback() {
            warn!(scope, bean = name, "Destruction callback failed: {}", err);
        }
    }
}

/// Scope stores partitioned by a conversation id.
///
/// Lookups and inserts lock the partitions briefly, `factory` runs without any lock held,
/// so it can resolve beans of the same scope.
/// A partition belongs to one unit of work, which isn't expected to create the same bean concurrently.
/// If it does, the first stored instance wins.
#[derive(Default)]
pub struct PartitionedStore {
    partitions: Mutex<HashMap<String, ScopeStore>>,
    listeners: RwLock<Vec<PartitionListener>>,
}

/// Called with the id of a torn down partition after its destruction callbacks ran
pub type PartitionListener = Box<dyn Fn(&str) + Send + Sync>;

impl PartitionedStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns the error of `factory`
    pub fn get_or_create(
        &self,
        partition: &str,
        name: &str,
        factory: &mut dyn FnMut() -> Result<Bean, ResolveErrorKind>,
    ) -> Result<Bean, ResolveErrorKind> {
        if let Some(bean) = self.partitions.lock().get(partition).and_then(|store| store.get(name)) {
            debug!(partition, "Found in cache");
            return Ok(bean);
        }
        debug!(partition, "Not found in cache");

        let bean = factory()?;

        let mut guard = self.partitions.lock();
        let store = guard.entry(partition.to_owned()).or_default();
        if let Some(existing) = store.get(name) {
            debug!(partition, "Instance created concurrently, using the stored one");
            return Ok(existing);
        }
        store.insert(name, bean.clone());
        Ok(bean)
    }

    #[must_use]
    pub fn get(&self, partition: &str, name: &str) -> Option<Bean> {
        self.partitions.lock().get(partition).and_then(|store| store.get(name))
    }

    pub fn take(&self, partition: &str, name: &str) -> (Option<Bean>, Option<DestructionCallback>) {
        self.partitions
            .lock()
            .get_mut(partition)
            .map_or((None, None), |store| store.take(name))
    }

    pub fn register_destruction_callback(&self, partition: &str, name: &str, callback: DestructionCallback) {
        self.partitions
            .lock()
            .entry(partition.to_owned())
            .or_default()
            .register_destruction_callback(name, callback);
    }

    #[must_use]
    pub fn contains_partition(&self, partition: &str) -> bool {
        self.partitions.lock().contains_key(partition)
    }

    /// Removes one partition, returning its callbacks in teardown order
    pub fn drain_partition(&self, partition: &str) -> Vec<(String, DestructionCallback)> {
        let store = self.partitions.lock().remove(partition);
        store.map(|mut store| store.drain()).unwrap_or_default()
    }

    /// Removes every partition, returning their callbacks in teardown order, partitions sorted by id
    pub fn drain_all(&self) -> Vec<(String, DestructionCallback)> {
        self.take_partitions()
            .into_iter()
            .flat_map(|(_, mut store)| store.drain())
            .collect()
    }

    fn take_partitions(&self) -> Vec<(String, ScopeStore)> {
        let mut partitions = self.partitions.lock().drain().collect::<Vec<_>>();
        partitions.sort_by(|(left, _), (right, _)| left.cmp(right));
        partitions
    }

    pub fn on_partition_destroyed(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.listeners.write().push(Box::new(listener));
    }

    fn notify_destroyed(&self, partition: &str) {
        for listener in self.listeners.read().iter() {
            listener(partition);
        }
    }

    /// Tears down one partition, then notifies the listeners.
    ///
    /// # Errors
    /// Returns [`ScopeErrorKind::Teardown`] if some destruction callbacks failed
    pub fn destroy_partition(&self, scope: &str, partition: &str) -> Result<(), ScopeErrorKind> {
        let callbacks = self.drain_partition(partition);
        debug!(scope, partition, callbacks = callbacks.len(), "Destroying partition");

        let result = run_destruction_callbacks(scope, callbacks);
        self.notify_destroyed(partition);
        result
    }

    /// Tears down every partition, then notifies the listeners of each of them.
    ///
    /// # Errors
    /// Returns [`ScopeErrorKind::Teardown`] if some destruction callbacks failed
    pub fn destroy_all(&self, scope: &str) -> Result<(), ScopeErrorKind> {
        let partitions = self.take_partitions();
        let ids = partitions.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>();
        let callbacks = partitions
            .into_iter()
            .flat_map(|(_, mut store)| store.drain())
            .collect::<Vec<_>>();
        debug!(scope, partitions = ids.len(), callbacks = callbacks.len(), "Destroying all partitions");

        let result = run_destruction_callbacks(scope, callbacks);
        for id in &ids {
            self.notify_destroyed(id);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::{run_destruction_callbacks, PartitionedStore, ScopeStore};
    use crate::{
        any::Bean,
        errors::{InstantiateErrorKind, ResolveErrorKind, ScopeErrorKind},
    };

    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_test::traced_test;

    fn recording(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> super::DestructionCallback {
        let log = log.clone();
        Box::new(move || -> Result<(), InstantiateErrorKind> {
            log.lock().push(name.to_owned());
            Ok(())
        })
    }

    #[test]
    #[traced_test]
    fn test_drain_reverse_creation_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut store = ScopeStore::new();

        for name in ["a", "b", "c"] {
            store.insert(name, Arc::new(()) as Bean);
            store.register_destruction_callback(name, recording(&log, name));
        }
        store.register_destruction_callback("orphan", recording(&log, "orphan"));
        assert_eq!(store.len(), 3);

        run_destruction_callbacks("singleton", store.drain()).unwrap();

        assert_eq!(*log.lock(), ["c", "b", "a", "orphan"]);
        assert!(store.is_empty());
    }

    #[test]
    #[traced_test]
    fn test_failing_callback_does_not_stop_teardown() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut store = ScopeStore::new();

        store.insert("a", Arc::new(()) as Bean);
        store.register_destruction_callback("a", recording(&log, "a"));
        store.insert("b", Arc::new(()) as Bean);
        store.register_destruction_callback("b", Box::new(|| -> Result<(), InstantiateErrorKind> {
            Err(anyhow::anyhow!("socket already closed").into())
        }));

        let err = run_destruction_callbacks("singleton", store.drain()).unwrap_err();

        assert!(matches!(err, ScopeErrorKind::Teardown { ref failed, .. } if failed == &["b"]));
        assert_eq!(*log.lock(), ["a"]);
        assert!(logs_contain("Destruction callback failed: socket already closed"));
    }

    #[test]
    fn test_take() {
        let mut store = ScopeStore::new();
        store.insert("a", Arc::new(1u8) as Bean);
        store.register_destruction_callback("a", Box::new(|| -> Result<(), InstantiateErrorKind> { Ok(()) }));

        let (bean, callback) = store.take("a");
        assert!(bean.is_some());
        assert!(callback.is_some());
        assert!(!store.contains("a"));
        assert!(store.drain().is_empty());
    }

    #[test]
    #[traced_test]
    fn test_partitions_are_isolated() {
        let store = PartitionedStore::new();
        let mut created = 0;
        let mut factory = || -> Result<Bean, ResolveErrorKind> {
            created += 1;
            Ok(Arc::new(created) as Bean)
        };

        let first = store.get_or_create("req-1", "a", &mut factory).unwrap();
        let again = store.get_or_create("req-1", "a", &mut factory).unwrap();
        let second = store.get_or_create("req-2", "a", &mut factory).unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(created, 2);

        assert!(store.drain_partition("req-1").is_empty());
        assert!(!store.contains_partition("req-1"));
        assert!(store.get("req-2", "a").is_some());
    }

    #[test]
    #[traced_test]
    fn test_destroy_notifies_listeners_after_callbacks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let store = PartitionedStore::new();
        let listener_log = log.clone();
        store.on_partition_destroyed(move |partition| listener_log.lock().push(format!("destroyed:{partition}")));

        for partition in ["req-1", "req-2", "req-3"] {
            store
                .get_or_create(partition, "a", &mut || -> Result<Bean, ResolveErrorKind> { Ok(Arc::new(())) })
                .unwrap();
        }
        store.register_destruction_callback("req-1", "a", recording(&log, "a"));

        store.destroy_partition("request", "req-1").unwrap();
        assert_eq!(*log.lock(), ["a", "destroyed:req-1"]);

        store.destroy_all("request").unwrap();
        assert_eq!(*log.lock(), ["a", "destroyed:req-1", "destroyed:req-2", "destroyed:req-3"]);
        assert!(!store.contains_partition("req-2"));
    }
}
