mod container;
mod definition;
mod dependency_resolver;
mod instantiate;
mod instantiator;

pub use container::{ContainerErrorKind, ScopeErrorKind};
pub use definition::DefinitionErrorKind;
pub use dependency_resolver::ResolveErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use instantiator::{CycleErrorKind, InstantiatorErrorKind};
