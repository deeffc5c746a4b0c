use core::any::TypeId;
use std::error::Error;

use super::{
    container::{ContainerErrorKind, ScopeErrorKind},
    definition::DefinitionErrorKind,
    instantiator::{CycleErrorKind, InstantiatorErrorKind},
};
use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error(transparent)]
    Definition(#[from] DefinitionErrorKind),
    #[error("No bean definition of type `{type_info}` found")]
    NoDefinitionOfType { type_info: TypeInfo },
    #[error(
        "Multiple beans of type `{type_info}` found: {}. Mark one of them as primary or use a qualifier",
        candidates.join(", ")
    )]
    NoUniqueDefinition { type_info: TypeInfo, candidates: Vec<String> },
    #[error(transparent)]
    Cycle(#[from] CycleErrorKind),
    #[error("Error creating bean `{name}`: {source}")]
    BeanCreation {
        name: String,
        #[source]
        source: Box<InstantiatorErrorKind>,
    },
    #[error(transparent)]
    Scope(#[from] ScopeErrorKind),
    #[error(transparent)]
    Container(#[from] ContainerErrorKind),
    #[error("Incorrect type of bean `{name}`. Actual: {actual:?}, expected: {expected}")]
    IncorrectType { name: String, expected: TypeInfo, actual: TypeId },
    #[error("Dependency `{name}` isn't among the resolved dependencies")]
    UnresolvedDependency { name: String },
}

impl ResolveErrorKind {
    #[inline]
    #[must_use]
    pub(crate) fn bean_creation(name: impl Into<String>, source: InstantiatorErrorKind) -> Self {
        Self::BeanCreation {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Returns `true` if nothing matched the requested name or type.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Definition(DefinitionErrorKind::NoSuchDefinition { .. }) | Self::NoDefinitionOfType { .. }
        )
    }

    /// Finds the circular dependency behind this error, if any.
    #[must_use]
    pub fn cycle(&self) -> Option<&CycleErrorKind> {
        match self {
            Self::Cycle(cycle) => Some(cycle),
            Self::BeanCreation { source, .. } => match source.as_ref() {
                InstantiatorErrorKind::Dependency { source, .. } => source.cycle(),
                _ => None,
            },
            _ => None,
        }
    }

    /// The innermost error of the [`Error::source`] chain.
    #[must_use]
    pub fn root_cause(&self) -> &(dyn Error + 'static) {
        let mut current: &(dyn Error + 'static) = self;
        while let Some(source) = current.source() {
            current = source;
        }
        current
    }
}
