//! Ambient conversation ids of the current thread.
//!
//! Request and session scopes partition their stores by a conversation id
//! that the caller establishes once per unit of work.
//! Ids are kept per thread and per scope instance, so they never leak to other threads
//! or to another container living on the same thread.

use core::{
    cell::RefCell,
    sync::atomic::{AtomicU64, Ordering},
};
use std::collections::HashMap;
use tracing::debug;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: RefCell<HashMap<u64, String>> = RefCell::new(HashMap::new());
}

/// Unique id of a scope or factory instance in this process
#[inline]
#[must_use]
pub(crate) fn next_instance_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

#[must_use]
pub(crate) fn current(owner: u64) -> Option<String> {
    CURRENT.with(|current| current.borrow().get(&owner).cloned())
}

pub(crate) fn set(owner: u64, conversation_id: impl Into<String>) -> Option<String> {
    CURRENT.with(|current| current.borrow_mut().insert(owner, conversation_id.into()))
}

pub(crate) fn clear(owner: u64) -> Option<String> {
    CURRENT.with(|current| current.borrow_mut().remove(&owner))
}

/// Keeps a conversation id current on this thread.
/// Restores the previous id of the same scope when dropped.
#[must_use = "the conversation ends when the guard is dropped"]
pub struct ConversationGuard {
    owner: u64,
    previous: Option<String>,
}

impl ConversationGuard {
    pub(crate) fn enter(owner: u64, conversation_id: impl Into<String>) -> Self {
        let conversation_id = conversation_id.into();
        debug!(conversation_id, "Conversation entered");

        Self {
            owner,
            previous: set(owner, conversation_id),
        }
    }
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(previous) => {
                set(self.owner, previous);
            }
            None => {
                clear(self.owner);
            }
        }
    }
}
