use core::cell::RefCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::errors::CycleErrorKind;

/// Capability of a bean that wants a callback once all of its dependencies are injected.
///
/// Registered with [`crate::BeanDefinitionBuilder::initializing`] as the `after_properties_set` post-construct method.
pub trait InitializingBean {
    /// # Errors
    /// An error here fails the creation of the bean
    fn after_properties_set(&self) -> anyhow::Result<()>;
}

/// Capability of a bean that owns resources to release when its scope is torn down.
///
/// Registered with [`crate::BeanDefinitionBuilder::disposable`] as the `destroy` pre-destroy method.
pub trait DisposableBean {
    /// # Errors
    /// An error here is logged by the teardown, the remaining callbacks still run
    fn destroy(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeanState {
    /// Definition is registered, there is no instance
    Declared,
    /// Instance is being constructed on some creation stack
    Resolving,
    /// Constructor or factory method returned
    Instantiated,
    /// Setter and field dependencies are applied
    Injected,
    /// Post-construct callbacks ran, the instance is ready for use
    Initialized,
    /// Pre-destroy callbacks ran
    Destroyed,
}

impl BeanState {
    /// Checks whether the state machine allows moving from `self` to `next`.
    ///
    /// Besides the forward path, a failed creation falls back to [`BeanState::Declared`]
    /// and a new instance may start resolving once the previous one is initialized or destroyed
    /// (prototype and scoped beans have many instances over time).
    #[must_use]
    pub const fn can_transition_to(self, next: BeanState) -> bool {
        use BeanState::{Declared, Destroyed, Initialized, Injected, Instantiated, Resolving};

        matches!(
            (self, next),
            (Declared | Initialized | Destroyed, Resolving)
                | (Resolving, Instantiated)
                | (Instantiated, Injected)
                | (Injected, Initialized)
                | (Initialized, Destroyed)
                | (Resolving | Instantiated | Injected, Declared)
        )
    }
}

type StateKey = (String, Option<String>);

/// State of the latest instance of every bean, keyed by bean name and scope conversation id.
#[derive(Debug, Default)]
pub(crate) struct LifecycleTracker {
    states: Mutex<HashMap<StateKey, BeanState>>,
}

impl LifecycleTracker {
    pub(crate) fn state(&self, name: &str, conversation_id: Option<&str>) -> BeanState {
        self.states
            .lock()
            .get(&(name.to_owned(), conversation_id.map(ToOwned::to_owned)))
            .copied()
            .unwrap_or(BeanState::Declared)
    }

    pub(crate) fn transition(&self, name: &str, conversation_id: Option<&str>, next: BeanState) {
        let mut guard = self.states.lock();
        let state = guard
            .entry((name.to_owned(), conversation_id.map(ToOwned::to_owned)))
            .or_insert(BeanState::Declared);

        if state.can_transition_to(next) {
            debug!(bean = name, from = ?state, to = ?next, "State changed");
        } else {
            warn!(bean = name, from = ?state, to = ?next, "Unexpected state transition");
        }
        *state = next;
    }

    /// Marks an initialized instance as destroyed, no-op in any other state
    pub(crate) fn mark_destroyed(&self, name: &str, conversation_id: Option<&str>) {
        let key = (name.to_owned(), conversation_id.map(ToOwned::to_owned));
        if let Some(state) = self.states.lock().get_mut(&key) {
            if *state == BeanState::Initialized {
                debug!(bean = name, "State changed to destroyed");
                *state = BeanState::Destroyed;
            }
        }
    }

    /// Drops the states of every bean in a torn down conversation
    pub(crate) fn forget_conversation(&self, conversation_id: &str) {
        let mut states = self.states.lock();
        let before = states.len();
        states.retain(|(_, entry), _| entry.as_deref() != Some(conversation_id));
        debug!(conversation_id, forgotten = before - states.len(), "Conversation states dropped");
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.states.lock().len()
    }

    /// Marks initialized instances of `name` in every conversation as destroyed
    pub(crate) fn mark_all_destroyed(&self, name: &str) {
        for ((entry, _), state) in self.states.lock().iter_mut() {
            if entry == name && *state == BeanState::Initialized {
                debug!(bean = name, "State changed to destroyed");
                *state = BeanState::Destroyed;
            }
        }
    }
}

thread_local! {
    static RESOLVING: RefCell<Vec<(u64, String)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a bean as currently resolving on this thread's creation stack.
///
/// The stack is keyed by factory id, so two factories used on one thread never see each other's beans,
/// and it's per thread, so concurrent creations never trip each other's cycle detection.
/// Leaves the stack when dropped, including on error paths.
#[must_use]
#[derive(Debug)]
pub(crate) struct ResolvingGuard {
    factory_id: u64,
}

impl ResolvingGuard {
    /// # Errors
    /// Returns [`CycleErrorKind::CyclicDependency`] with the path from the first occurrence of `name`
    /// if it's already resolving on this stack
    pub(crate) fn enter(factory_id: u64, name: &str) -> Result<Self, CycleErrorKind> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();

            if let Some(pos) = stack.iter().position(|(id, entry)| *id == factory_id && entry == name) {
                let mut path = stack[pos..]
                    .iter()
                    .filter(|(id, _)| *id == factory_id)
                    .map(|(_, entry)| entry.clone())
                    .collect::<Vec<_>>();
                path.push(name.to_owned());
                return Err(CycleErrorKind::CyclicDependency { path });
            }

            stack.push((factory_id, name.to_owned()));
            Ok(Self { factory_id })
        })
    }

    #[cfg(test)]
    pub(crate) fn is_resolving(factory_id: u64, name: &str) -> bool {
        RESOLVING.with(|stack| stack.borrow().iter().any(|(id, entry)| *id == factory_id && entry == name))
    }
}

impl Drop for ResolvingGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|(id, _)| *id == self.factory_id) {
                stack.remove(pos);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{BeanState, LifecycleTracker, ResolvingGuard};

    use std::thread;
    use tracing_test::traced_test;

    #[test]
    fn test_transitions() {
        use BeanState::{Declared, Destroyed, Initialized, Injected, Instantiated, Resolving};

        assert!(Declared.can_transition_to(Resolving));
        assert!(Resolving.can_transition_to(Instantiated));
        assert!(Instantiated.can_transition_to(Injected));
        assert!(Injected.can_transition_to(Initialized));
        assert!(Initialized.can_transition_to(Destroyed));
        assert!(Destroyed.can_transition_to(Resolving));
        assert!(Injected.can_transition_to(Declared));

        assert!(!Declared.can_transition_to(Initialized));
        assert!(!Destroyed.can_transition_to(Initialized));
        assert!(!Resolving.can_transition_to(Destroyed));
    }

    #[test]
    #[traced_test]
    fn test_tracker() {
        let tracker = LifecycleTracker::default();
        assert_eq!(tracker.state("a", None), BeanState::Declared);

        for state in [
            BeanState::Resolving,
            BeanState::Instantiated,
            BeanState::Injected,
            BeanState::Initialized,
        ] {
            tracker.transition("a", None, state);
        }
        tracker.transition("a", Some("req-1"), BeanState::Resolving);

        assert_eq!(tracker.state("a", None), BeanState::Initialized);
        assert_eq!(tracker.state("a", Some("req-1")), BeanState::Resolving);

        tracker.mark_destroyed("a", Some("req-1"));
        assert_eq!(tracker.state("a", Some("req-1")), BeanState::Resolving);

        tracker.mark_destroyed("a", None);
        assert_eq!(tracker.state("a", None), BeanState::Destroyed);

        for state in [
            BeanState::Instantiated,
            BeanState::Injected,
            BeanState::Initialized,
        ] {
            tracker.transition("a", Some("req-1"), state);
        }
        tracker.mark_all_destroyed("a");
        assert_eq!(tracker.state("a", Some("req-1")), BeanState::Destroyed);
    }

    #[test]
    #[traced_test]
    fn test_forget_conversation() {
        let tracker = LifecycleTracker::default();
        tracker.transition("a", None, BeanState::Resolving);
        for conversation_id in ["req-1", "req-2"] {
            tracker.transition("a", Some(conversation_id), BeanState::Resolving);
            tracker.transition("b", Some(conversation_id), BeanState::Resolving);
        }

        tracker.forget_conversation("req-1");

        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.state("a", Some("req-1")), BeanState::Declared);
        assert_eq!(tracker.state("b", Some("req-2")), BeanState::Resolving);
        assert_eq!(tracker.state("a", None), BeanState::Resolving);
    }

    #[test]
    fn test_resolving_cycle_path() {
        let a = ResolvingGuard::enter(1, "a").unwrap();
        let b = ResolvingGuard::enter(1, "b").unwrap();
        let other_factory = ResolvingGuard::enter(2, "a").unwrap();

        let err = ResolvingGuard::enter(1, "a").unwrap_err();
        assert_eq!(err.path(), ["a", "b", "a"]);

        drop(other_factory);
        drop(b);
        assert!(ResolvingGuard::is_resolving(1, "a"));
        assert!(!ResolvingGuard::is_resolving(1, "b"));

        drop(a);
        assert!(!ResolvingGuard::is_resolving(1, "a"));
    }

    #[test]
    fn test_resolving_is_per_thread() {
        let _guard = ResolvingGuard::enter(3, "a").unwrap();

        thread::spawn(|| {
            assert!(!ResolvingGuard::is_resolving(3, "a"));
            ResolvingGuard::enter(3, "a").is_ok()
        })
        .join()
        .map(|entered| assert!(entered))
        .unwrap();
    }
}
