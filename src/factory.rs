use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info_span, warn};

use crate::{
    any::{Bean, TypeInfo},
    config::Config,
    context,
    definition::BeanDefinition,
    dependency::DependencyDescriptor,
    dependency_resolver::DependencyResolver,
    errors::{CycleErrorKind, DefinitionErrorKind, InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind, ScopeErrorKind},
    event::DefinitionSource,
    graph::DependencyGraph,
    inject::{downcast_bean, Resolved, ResolvedDependencies},
    lifecycle::{BeanState, LifecycleTracker, ResolvingGuard},
    post_processor::BeanPostProcessor,
    registry::BeanDefinitionRegistry,
    scope::{DefaultScope, DestructionCallback, Scope, ScopeRegistry},
};

struct FactoryInner {
    /// Key of this factory on the per-thread resolving stack
    id: u64,
    config: Config,
    registry: RwLock<BeanDefinitionRegistry>,
    scopes: ScopeRegistry,
    post_processors: RwLock<Vec<Arc<dyn BeanPostProcessor>>>,
    lifecycle: Arc<LifecycleTracker>,
}

/// Creates beans from registered definitions and caches them in their scopes.
///
/// Cloning is cheap, clones share definitions, scopes and caches.
#[derive(Clone)]
pub struct BeanFactory {
    inner: Arc<FactoryInner>,
}

impl Default for BeanFactory {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl BeanFactory {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let scopes = ScopeRegistry::new();
        let lifecycle = Arc::new(LifecycleTracker::default());

        let request_lifecycle = lifecycle.clone();
        scopes
            .request()
            .on_request_destroyed(move |request_id| request_lifecycle.forget_conversation(request_id));
        let session_lifecycle = lifecycle.clone();
        scopes
            .session()
            .on_session_destroyed(move |session_id| session_lifecycle.forget_conversation(session_id));

        Self {
            inner: Arc::new(FactoryInner {
                id: context::next_instance_id(),
                config,
                registry: RwLock::new(BeanDefinitionRegistry::new()),
                scopes,
                post_processors: RwLock::new(Vec::new()),
                lifecycle,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Registers a definition if it's eligible for the active profiles and its conditions hold,
    /// otherwise skips it.
    ///
    /// # Errors
    /// Returns [`DefinitionErrorKind::Duplicate`] if a definition with the same name is registered
    pub fn register_definition(&self, definition: impl Into<BeanDefinition>) -> Result<(), DefinitionErrorKind> {
        let definition = definition.into();
        if !definition.is_eligible(&self.inner.config.active_profiles) {
            debug!(bean = definition.name(), "Definition skipped, it isn't eligible");
            return Ok(());
        }

        self.inner.registry.write().register(definition).map_err(|err| {
            error!("{}", err);
            err
        })
    }

    /// Registers definitions in order, stopping at the first failure
    ///
    /// # Errors
    /// Returns [`DefinitionErrorKind::Duplicate`] if a definition with the same name is registered
    pub fn register_definitions(
        &self,
        definitions: impl IntoIterator<Item = BeanDefinition>,
    ) -> Result<(), DefinitionErrorKind> {
        definitions
            .into_iter()
            .try_for_each(|definition| self.register_definition(definition))
    }

    /// # Errors
    /// Returns [`DefinitionErrorKind::Duplicate`] if a definition with the same name is registered
    pub fn register_source(&self, source: &impl DefinitionSource) -> Result<(), DefinitionErrorKind> {
        self.register_definitions(source.definitions())
    }

    /// Adds a processor run around the post-construct callbacks of every bean created afterwards
    pub fn add_post_processor(&self, processor: impl BeanPostProcessor + 'static) {
        debug!(processor = processor.name(), "Post-processor added");
        self.inner.post_processors.write().push(Arc::new(processor));
    }

    /// # Errors
    /// Returns [`ScopeErrorKind::ReservedName`] if `name` is one of the built-in scopes
    pub fn register_scope(&self, name: impl Into<String>, scope: Arc<dyn Scope>) -> Result<(), ScopeErrorKind> {
        self.inner.scopes.register(name, scope)
    }

    #[inline]
    #[must_use]
    pub fn scopes(&self) -> &ScopeRegistry {
        &self.inner.scopes
    }

    fn definition_arc(&self, name: &str) -> Result<Arc<BeanDefinition>, DefinitionErrorKind> {
        self.inner.registry.read().get(name).cloned()
    }

    fn scope_of(&self, definition: &BeanDefinition) -> Result<Arc<dyn Scope>, ScopeErrorKind> {
        self.inner
            .scopes
            .get(definition.scope())
            .ok_or_else(|| ScopeErrorKind::UnknownScope {
                name: definition.scope().to_owned(),
            })
    }

    /// Gets the bean from its scope, creating it on a cache miss.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::Definition`] if there is no definition with this name
    /// - Returns [`ResolveErrorKind::Scope`] if the scope of the definition isn't registered or can't be used now
    /// - Returns [`ResolveErrorKind::Cycle`] if the bean is already being created on this thread
    /// - Returns [`ResolveErrorKind::BeanCreation`] if any step of the creation failed
    pub fn get(&self, name: &str) -> Result<Bean, ResolveErrorKind> {
        let definition = match self.definition_arc(name) {
            Ok(definition) => definition,
            Err(err) => {
                let err = ResolveErrorKind::from(err);
                error!("{}", err);
                return Err(err);
            }
        };

        let span = info_span!("get", bean = name, scope = definition.scope());
        let _guard = span.enter();

        let scope = match self.scope_of(&definition) {
            Ok(scope) => scope,
            Err(err) => {
                let err = ResolveErrorKind::from(err);
                error!("{}", err);
                return Err(err);
            }
        };
        let conversation_id = scope.conversation_id();

        let mut created = None;
        let mut create = || -> Result<Bean, ResolveErrorKind> {
            debug!("Not found in cache");
            let (bean, callback) = self.create_bean(&definition, conversation_id.as_deref())?;
            created = callback.map(|callback| (bean.clone(), callback));
            Ok(bean)
        };
        let result = scope.get(name, &mut create);

        let result = result.and_then(|bean| {
            if let Some((instance, callback)) = created {
                register_destruction_callback(scope.as_ref(), name, &bean, &instance, callback)?;
            }
            Ok(bean)
        });
        if let Err(err) = &result {
            error!("{}", err);
        }
        result
    }

    /// Same as [`Self::get`], downcasting the bean to `T`.
    ///
    /// # Errors
    /// Same as [`Self::get`], and [`ResolveErrorKind::IncorrectType`] if the bean isn't a `T`
    pub fn get_as<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ResolveErrorKind> {
        downcast_bean(name, self.get(name)?)
    }

    /// Name of the only bean of type `T`, a primary bean wins among several candidates.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NoDefinitionOfType`] if there is no candidate
    /// - Returns [`ResolveErrorKind::NoUniqueDefinition`] if candidates are ambiguous
    pub fn name_of_type<T: ?Sized + 'static>(&self) -> Result<String, ResolveErrorKind> {
        self.unique_name_of_type(&TypeInfo::of::<T>())
    }

    fn unique_name_of_type(&self, type_info: &TypeInfo) -> Result<String, ResolveErrorKind> {
        let registry = self.inner.registry.read();
        let name = DependencyResolver::new(&registry).unique_name_of_type(type_info)?;
        Ok(name.to_owned())
    }

    /// Names of the beans of type `T`, in registration order
    #[must_use]
    pub fn names_of_type<T: ?Sized + 'static>(&self) -> Vec<String> {
        self.inner.registry.read().names_of_type(&TypeInfo::of::<T>()).to_vec()
    }

    /// Gets the only bean of type `T`, see [`Self::name_of_type`].
    ///
    /// # Errors
    /// Same as [`Self::name_of_type`] and [`Self::get_as`]
    pub fn get_by_type<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        let name = self.name_of_type::<T>().map_err(|err| {
            error!("{}", err);
            err
        })?;
        self.get_as(&name)
    }

    /// Gets every bean of type `T` with its name, in registration order.
    ///
    /// # Errors
    /// Same as [`Self::get_as`] for each of the beans
    pub fn beans_of_type<T: Send + Sync + 'static>(&self) -> Result<Vec<(String, Arc<T>)>, ResolveErrorKind> {
        self.names_of_type::<T>()
            .into_iter()
            .map(|name| {
                let bean = self.get_as(&name)?;
                Ok((name, bean))
            })
            .collect()
    }

    /// Resolves a single dependency: the qualifier names the bean, otherwise the unique bean of the required type.
    ///
    /// Returns `Ok(None)` if an optional dependency matches nothing.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NoUniqueDefinition`] if the required type is ambiguous
    /// - Returns a not-found error if a required dependency matches nothing
    /// - Returns any error of [`Self::get`] for the matched bean
    pub fn resolve_dependency(&self, descriptor: &DependencyDescriptor) -> Result<Option<Bean>, ResolveErrorKind> {
        let result = match &descriptor.qualifier {
            Some(qualifier) => self.get(qualifier),
            None => self
                .unique_name_of_type(&descriptor.required_type)
                .and_then(|name| self.get(&name)),
        };

        match result {
            Ok(bean) => Ok(Some(bean)),
            Err(err) if !descriptor.required && err.is_not_found() => {
                debug!(dependency = descriptor.name, "Optional dependency not found");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Resolves a collection dependency to every bean of the required type, in registration order.
    /// Nothing matching is an empty collection.
    ///
    /// # Errors
    /// Returns any error of [`Self::get`] for one of the beans
    pub fn resolve_collection(&self, descriptor: &DependencyDescriptor) -> Result<Vec<(String, Bean)>, ResolveErrorKind> {
        let names = self
            .inner
            .registry
            .read()
            .names_of_type(&descriptor.required_type)
            .to_vec();

        names
            .into_iter()
            .map(|name| {
                let bean = self.get(&name)?;
                Ok((name, bean))
            })
            .collect()
    }

    fn resolve(&self, descriptor: &DependencyDescriptor) -> Result<Resolved, ResolveErrorKind> {
        if descriptor.collection {
            self.resolve_collection(descriptor).map(Resolved::Collection)
        } else {
            self.resolve_dependency(descriptor).map(Resolved::Single)
        }
    }

    fn create_bean(
        &self,
        definition: &Arc<BeanDefinition>,
        conversation_id: Option<&str>,
    ) -> Result<(Bean, Option<DestructionCallback>), ResolveErrorKind> {
        let name = definition.name();
        let _resolving = ResolvingGuard::enter(self.inner.id, name)?;

        let span = info_span!("create", bean = name);
        let _guard = span.enter();

        let lifecycle = &self.inner.lifecycle;
        lifecycle.transition(name, conversation_id, BeanState::Resolving);

        let result = self.create_instance(definition, conversation_id);
        match &result {
            Ok(_) => lifecycle.transition(name, conversation_id, BeanState::Initialized),
            Err(_) => lifecycle.transition(name, conversation_id, BeanState::Declared),
        }
        result
    }

    /// Runs the creation pipeline, returning the bean as the post-processors left it
    /// and the destruction callback of the instance if it has pre-destroy methods.
    /// Lifecycle methods always see the instance itself, never a replacement of a post-processor.
    fn create_instance(
        &self,
        definition: &Arc<BeanDefinition>,
        conversation_id: Option<&str>,
    ) -> Result<(Bean, Option<DestructionCallback>), ResolveErrorKind> {
        let name = definition.name();
        let lifecycle = &self.inner.lifecycle;
        let creation_error = |source: InstantiatorErrorKind| ResolveErrorKind::bean_creation(name, source);

        let mut arguments = ResolvedDependencies::new();
        if let Some(factory_bean) = definition.factory_method().and_then(|method| method.factory_bean()) {
            let bean = self
                .get(factory_bean)
                .map_err(|err| dependency_error(name, factory_bean, err))?;
            arguments.set_factory_bean(factory_bean, bean);
        }
        for descriptor in definition.constructor_dependencies() {
            let resolved = self
                .resolve(descriptor)
                .map_err(|err| dependency_error(name, &descriptor.name, err))?;
            arguments.push(descriptor.name.clone(), resolved);
        }

        match definition.factory_method() {
            Some(method) => debug!(method = method.name(), "Invoking factory method"),
            None => debug!("Invoking constructor"),
        }
        let mut instance = definition
            .construct(&arguments)
            .map_err(|err| creation_error(InstantiatorErrorKind::Instantiate(err)))?;
        lifecycle.transition(name, conversation_id, BeanState::Instantiated);

        for injector in definition.injectors() {
            let descriptor = &injector.descriptor;
            let resolved = self
                .resolve(descriptor)
                .map_err(|err| dependency_error(name, &descriptor.name, err))?;
            injector.inject(&mut *instance, &resolved).map_err(|source| {
                creation_error(InstantiatorErrorKind::Injection {
                    dependency: descriptor.name.clone(),
                    source,
                })
            })?;
        }
        lifecycle.transition(name, conversation_id, BeanState::Injected);

        let instance: Bean = Arc::from(instance);
        let mut bean = instance.clone();

        let processors = self.inner.post_processors.read().clone();
        for processor in &processors {
            bean = processor
                .before_initialization(bean, name)
                .map_err(|err| post_processor_error(name, processor.as_ref(), err))?;
        }

        for method in definition.post_construct_methods() {
            debug!(method = method.name(), "Running post-construct method");
            method.invoke(&*instance).map_err(|source| {
                creation_error(InstantiatorErrorKind::Callback {
                    method: method.name().to_owned(),
                    source,
                })
            })?;
        }

        for processor in &processors {
            bean = processor
                .after_initialization(bean, name)
                .map_err(|err| post_processor_error(name, processor.as_ref(), err))?;
        }

        let callback = (!definition.pre_destroy_methods().is_empty())
            .then(|| self.destruction_callback(definition, instance, conversation_id));
        Ok((bean, callback))
    }

    /// Runs every pre-destroy method in declared order, a failing method doesn't stop the next ones.
    /// The first failure is returned.
    fn destruction_callback(
        &self,
        definition: &Arc<BeanDefinition>,
        instance: Bean,
        conversation_id: Option<&str>,
    ) -> DestructionCallback {
        let definition = definition.clone();
        let lifecycle = self.inner.lifecycle.clone();
        let conversation_id = conversation_id.map(ToOwned::to_owned);

        Box::new(move || -> Result<(), InstantiateErrorKind> {
            let name = definition.name();
            let mut first_error = None;

            for method in definition.pre_destroy_methods() {
                debug!(bean = name, method = method.name(), "Running pre-destroy method");
                if let Err(err) = method.invoke(&*instance) {
                    warn!(bean = name, method = method.name(), "Pre-destroy method failed: {}", err);
                    first_error.get_or_insert(err);
                }
            }
            lifecycle.mark_destroyed(name, conversation_id.as_deref());

            first_error.map_or(Ok(()), Err)
        })
    }

    #[must_use]
    pub fn contains_definition(&self, name: &str) -> bool {
        self.inner.registry.read().contains(name)
    }

    /// # Errors
    /// Returns [`DefinitionErrorKind::NoSuchDefinition`] if there is no definition with this name
    pub fn definition(&self, name: &str) -> Result<Arc<BeanDefinition>, DefinitionErrorKind> {
        self.definition_arc(name)
    }

    /// Names in registration order
    #[must_use]
    pub fn definition_names(&self) -> Vec<String> {
        self.inner.registry.read().names().to_vec()
    }

    /// # Errors
    /// Returns [`DefinitionErrorKind::NoSuchDefinition`] if there is no definition with this name
    pub fn is_singleton(&self, name: &str) -> Result<bool, DefinitionErrorKind> {
        self.definition_arc(name)
            .map(|definition| definition.scope() == DefaultScope::Singleton.name())
    }

    /// # Errors
    /// Returns [`DefinitionErrorKind::NoSuchDefinition`] if there is no definition with this name
    pub fn is_prototype(&self, name: &str) -> Result<bool, DefinitionErrorKind> {
        self.definition_arc(name)
            .map(|definition| definition.scope() == DefaultScope::Prototype.name())
    }

    /// # Errors
    /// Returns [`DefinitionErrorKind::NoSuchDefinition`] if there is no definition with this name
    pub fn type_of(&self, name: &str) -> Result<TypeInfo, DefinitionErrorKind> {
        self.definition_arc(name).map(|definition| definition.type_info())
    }

    /// Graph of the registered definitions, built fresh on every call
    #[must_use]
    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyResolver::new(&self.inner.registry.read()).build_graph()
    }

    /// # Errors
    /// Returns [`CycleErrorKind::CyclicDependency`] with the first cycle of the graph
    pub fn validate(&self) -> Result<DependencyGraph, CycleErrorKind> {
        DependencyResolver::new(&self.inner.registry.read()).validate_all()
    }

    /// # Errors
    /// Returns [`CycleErrorKind::CyclicDependency`] if the graph isn't acyclic
    pub fn creation_order(&self) -> Result<Vec<String>, CycleErrorKind> {
        self.dependency_graph().creation_order()
    }

    /// State of the latest instance of the bean in the current conversation of its scope
    #[must_use]
    pub fn bean_state(&self, name: &str) -> BeanState {
        let conversation_id = self
            .definition_arc(name)
            .ok()
            .and_then(|definition| self.scope_of(&definition).ok())
            .and_then(|scope| scope.conversation_id());

        self.inner.lifecycle.state(name, conversation_id.as_deref())
    }

    /// Removes the cached instance of the bean from its scope, running its pre-destroy methods.
    /// Returns `false` if nothing was cached.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::Definition`] if there is no definition with this name
    /// - Returns [`ResolveErrorKind::Scope`] if the scope of the definition isn't registered
    pub fn destroy_bean(&self, name: &str) -> Result<bool, ResolveErrorKind> {
        let definition = self.definition_arc(name)?;
        let scope = self.scope_of(&definition)?;
        let conversation_id = scope.conversation_id();

        let removed = scope.remove(name).is_some();
        if removed {
            debug!(bean = name, "Bean destroyed");
            self.inner.lifecycle.mark_destroyed(name, conversation_id.as_deref());
        }
        Ok(removed)
    }

    /// Tears down the singleton scope, the next `get` of a singleton creates a new instance.
    ///
    /// # Errors
    /// Returns [`ScopeErrorKind::Teardown`] if some pre-destroy methods failed, the others still run
    pub fn destroy_singletons(&self) -> Result<(), ScopeErrorKind> {
        let result = self.inner.scopes.singleton().destroy();

        let singleton = DefaultScope::Singleton.name();
        for definition in self.inner.registry.read().definitions() {
            if definition.scope() == singleton {
                self.inner.lifecycle.mark_destroyed(definition.name(), None);
            }
        }
        result
    }

    /// Tears down every scope in reverse registration order, returns the failures
    pub(crate) fn destroy_scopes(&self) -> Vec<ScopeErrorKind> {
        let failures = self.inner.scopes.destroy_all();

        let prototype = DefaultScope::Prototype.name();
        for definition in self.inner.registry.read().definitions() {
            if definition.scope() != prototype {
                self.inner.lifecycle.mark_all_destroyed(definition.name());
            }
        }
        failures
    }

    /// Creates every non-lazy singleton, dependencies first.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::Cycle`] if the graph isn't acyclic
    /// - Returns any error of [`Self::get`]
    pub fn preinstantiate_singletons(&self) -> Result<(), ResolveErrorKind> {
        let order = self.creation_order().map_err(|err| {
            error!("{}", err);
            err
        })?;

        for name in order {
            let Ok(definition) = self.definition_arc(&name) else {
                continue;
            };
            if definition.scope() == DefaultScope::Singleton.name() && !definition.is_lazy_init() {
                debug!(bean = name, "Pre-instantiating singleton");
                self.get(&name)?;
            }
        }
        Ok(())
    }
}

/// Hands the callback of a created instance to its scope, if the scope cached that instance.
/// An instance discarded in favor of one stored concurrently is dropped with its callback.
fn register_destruction_callback(
    scope: &dyn Scope,
    name: &str,
    cached: &Bean,
    created: &Bean,
    callback: DestructionCallback,
) -> Result<(), ResolveErrorKind> {
    if !Arc::ptr_eq(cached, created) {
        debug!("Created instance discarded by the scope, its destruction callback is dropped");
        return Ok(());
    }
    scope
        .register_destruction_callback(name, callback)
        .map_err(|err| ResolveErrorKind::bean_creation(name, InstantiatorErrorKind::Scope(err)))
}

/// Cycles keep propagating unwrapped so the outermost `get` reports the path
fn dependency_error(name: &str, dependency: &str, err: ResolveErrorKind) -> ResolveErrorKind {
    match err {
        ResolveErrorKind::Cycle(cycle) => ResolveErrorKind::Cycle(cycle),
        err => ResolveErrorKind::bean_creation(
            name,
            InstantiatorErrorKind::Dependency {
                dependency: dependency.to_owned(),
                source: Box::new(err),
            },
        ),
    }
}

fn post_processor_error(name: &str, processor: &dyn BeanPostProcessor, err: anyhow::Error) -> ResolveErrorKind {
    ResolveErrorKind::bean_creation(
        name,
        InstantiatorErrorKind::PostProcessor {
            processor: processor.name().to_owned(),
            source: InstantiateErrorKind::from(err),
        },
    )
}
