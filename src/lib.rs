pub(crate) mod any;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod definition;
pub(crate) mod dependency;
pub(crate) mod dependency_resolver;
pub(crate) mod errors;
pub(crate) mod event;
pub(crate) mod factory;
pub(crate) mod graph;
pub(crate) mod inject;
pub(crate) mod lifecycle;
pub(crate) mod post_processor;
pub(crate) mod registry;
pub(crate) mod scope;

pub use any::{Bean, TypeInfo};
pub use config::Config;
pub use container::{Container, ContainerState};
pub use context::ConversationGuard;
pub use definition::{BeanDefinition, BeanDefinitionBuilder, FactoryMethod, LifecycleMethod};
pub use dependency::{DependencyDescriptor, DependencyTarget, InjectionKind};
pub use dependency_resolver::DependencyResolver;
pub use errors::{
    ContainerErrorKind, CycleErrorKind, DefinitionErrorKind, InstantiateErrorKind, InstantiatorErrorKind,
    ResolveErrorKind, ScopeErrorKind,
};
pub use event::{DefinitionSource, LifecycleEvent, LifecycleListener};
pub use factory::BeanFactory;
pub use graph::DependencyGraph;
pub use inject::ResolvedDependencies;
pub use lifecycle::{BeanState, DisposableBean, InitializingBean};
pub use post_processor::BeanPostProcessor;
pub use registry::BeanDefinitionRegistry;
pub use scope::{
    run_destruction_callbacks, DefaultScope, DestructionCallback, PartitionListener, PartitionedStore, PrototypeScope,
    RequestScope, Scope, ScopeRegistry, ScopeStore, SessionScope, SingletonScope,
};
