use crate::definition::BeanDefinition;

/// Transition of a container signalled to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The container validated its definitions and became active
    Refreshed,
    /// All scopes of the container were torn down
    Closed,
}

/// Receiver of container lifecycle events, usually an event-publishing layer
pub trait LifecycleListener: Send + Sync {
    fn on_event(&self, event: LifecycleEvent);
}

impl<F> LifecycleListener for F
where
    F: Fn(LifecycleEvent) + Send + Sync,
{
    #[inline]
    fn on_event(&self, event: LifecycleEvent) {
        self(event);
    }
}

/// Producer of fully formed definitions, e.g. a component scanner or a configuration class.
/// The factory registers them in the returned order.
pub trait DefinitionSource {
    fn definitions(&self) -> Vec<BeanDefinition>;
}

impl DefinitionSource for Vec<BeanDefinition> {
    #[inline]
    fn definitions(&self) -> Vec<BeanDefinition> {
        self.clone()
    }
}
