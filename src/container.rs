use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, error, info_span};

use crate::{
    any::Bean,
    config::Config,
    definition::BeanDefinition,
    errors::{ContainerErrorKind, DefinitionErrorKind, ResolveErrorKind},
    event::{DefinitionSource, LifecycleEvent, LifecycleListener},
    factory::BeanFactory,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerState {
    /// Definitions can be registered, beans can't be requested yet
    Created,
    Active,
    /// Scopes are torn down, the container can't be used anymore
    Closed,
}

struct ContainerInner {
    factory: BeanFactory,
    listeners: RwLock<Vec<Arc<dyn LifecycleListener>>>,
    state: Mutex<ContainerState>,
}

impl ContainerInner {
    fn emit(&self, event: LifecycleEvent) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_event(event);
        }
        debug!(?event, "Lifecycle event emitted");
    }

    fn close(&self) {
        {
            let mut state = self.state.lock();
            if *state == ContainerState::Closed {
                return;
            }
            *state = ContainerState::Closed;
        }

        let failures = self.factory.destroy_scopes();
        if failures.is_empty() {
            debug!("Scopes destroyed");
        } else {
            error!(failed = failures.len(), "Scopes destroyed with failures");
        }

        self.emit(LifecycleEvent::Closed);
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if *self.state.get_mut() != ContainerState::Closed {
            self.close();
            debug!("Container closed on drop");
        }
    }
}

/// Application context on top of a [`BeanFactory`].
///
/// Definitions are registered while the container is created, [`Container::refresh`] validates them
/// and activates it, [`Container::close`] tears every scope down.
/// Clones share the same container, it's closed when the last one is dropped.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Container {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_factory(BeanFactory::new(config))
    }

    #[must_use]
    pub fn with_factory(factory: BeanFactory) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                factory,
                listeners: RwLock::new(Vec::new()),
                state: Mutex::new(ContainerState::Created),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn factory(&self) -> &BeanFactory {
        &self.inner.factory
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> ContainerState {
        *self.inner.state.lock()
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == ContainerState::Active
    }

    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == ContainerState::Closed
    }

    /// # Errors
    /// Returns [`DefinitionErrorKind::Duplicate`] if a definition with the same name is registered
    #[inline]
    pub fn register_definition(&self, definition: impl Into<BeanDefinition>) -> Result<(), DefinitionErrorKind> {
        self.inner.factory.register_definition(definition)
    }

    /// # Errors
    /// Returns [`DefinitionErrorKind::Duplicate`] if a definition with the same name is registered
    #[inline]
    pub fn register_source(&self, source: &impl DefinitionSource) -> Result<(), DefinitionErrorKind> {
        self.inner.factory.register_source(source)
    }

    pub fn add_listener(&self, listener: impl LifecycleListener + 'static) {
        self.inner.listeners.write().push(Arc::new(listener));
    }

    /// Validates the definitions, creates non-lazy singletons if configured and activates the container.
    /// Refreshing an active container validates it again.
    ///
    /// # Errors
    /// - Returns [`ContainerErrorKind::Closed`] if the container is closed
    /// - Returns [`ResolveErrorKind::Cycle`] if the dependency graph isn't acyclic
    /// - Returns any error of pre-instantiating a singleton
    pub fn refresh(&self) -> Result<(), ResolveErrorKind> {
        let span = info_span!("refresh");
        let _guard = span.enter();

        self.check_not_closed()?;

        let config = self.inner.factory.config();
        if config.validate_on_refresh {
            self.inner.factory.validate()?;
        }
        if config.preinstantiate_singletons {
            self.inner.factory.preinstantiate_singletons()?;
        }

        {
            let mut state = self.inner.state.lock();
            if *state == ContainerState::Closed {
                let err = ResolveErrorKind::from(ContainerErrorKind::Closed);
                error!("{}", err);
                return Err(err);
            }
            *state = ContainerState::Active;
        }
        debug!("Container refreshed");

        self.inner.emit(LifecycleEvent::Refreshed);
        Ok(())
    }

    /// Tears down every scope and emits [`LifecycleEvent::Closed`].
    /// Closing a closed container does nothing.
    #[inline]
    pub fn close(&self) {
        self.inner.close();
    }

    fn check_not_closed(&self) -> Result<(), ResolveErrorKind> {
        if self.is_closed() {
            let err = ResolveErrorKind::from(ContainerErrorKind::Closed);
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    fn check_active(&self) -> Result<(), ResolveErrorKind> {
        let err = match self.state() {
            ContainerState::Active => return Ok(()),
            ContainerState::Created => ContainerErrorKind::NotActive,
            ContainerState::Closed => ContainerErrorKind::Closed,
        };
        let err = ResolveErrorKind::from(err);
        error!("{}", err);
        Err(err)
    }

    /// # Errors
    /// - Returns [`ResolveErrorKind::Container`] if the container isn't active
    /// - Returns any error of [`BeanFactory::get`]
    pub fn get(&self, name: &str) -> Result<Bean, ResolveErrorKind> {
        self.check_active()?;
        self.inner.factory.get(name)
    }

    /// # Errors
    /// - Returns [`ResolveErrorKind::Container`] if the container isn't active
    /// - Returns any error of [`BeanFactory::get_as`]
    pub fn get_as<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ResolveErrorKind> {
        self.check_active()?;
        self.inner.factory.get_as(name)
    }

    /// # Errors
    /// - Returns [`ResolveErrorKind::Container`] if the container isn't active
    /// - Returns any error of [`BeanFactory::get_by_type`]
    pub fn get_by_type<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.check_active()?;
        self.inner.factory.get_by_type()
    }

    /// # Errors
    /// - Returns [`ResolveErrorKind::Container`] if the container isn't active
    /// - Returns any error of [`BeanFactory::beans_of_type`]
    pub fn beans_of_type<T: Send + Sync + 'static>(&self) -> Result<Vec<(String, Arc<T>)>, ResolveErrorKind> {
        self.check_active()?;
        self.inner.factory.beans_of_type()
    }
}
