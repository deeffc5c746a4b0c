use core::fmt::{self, Display, Formatter};

use super::{container::ScopeErrorKind, dependency_resolver::ResolveErrorKind, instantiate::InstantiateErrorKind};

/// The step of the creation pipeline that failed, together with its cause.
#[derive(thiserror::Error, Debug)]
pub enum InstantiatorErrorKind {
    #[error("failed to resolve dependency `{dependency}`: {source}")]
    Dependency {
        dependency: String,
        #[source]
        source: Box<ResolveErrorKind>,
    },
    #[error("instantiation failed: {0}")]
    Instantiate(#[source] InstantiateErrorKind),
    #[error("failed to inject dependency `{dependency}`: {source}")]
    Injection {
        dependency: String,
        #[source]
        source: InstantiateErrorKind,
    },
    #[error("post-processor `{processor}` failed: {source}")]
    PostProcessor {
        processor: String,
        #[source]
        source: InstantiateErrorKind,
    },
    #[error("lifecycle method `{method}` failed: {source}")]
    Callback {
        method: String,
        #[source]
        source: InstantiateErrorKind,
    },
    #[error(transparent)]
    Scope(ScopeErrorKind),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CycleErrorKind {
    CyclicDependency { path: Vec<String> },
}

impl CycleErrorKind {
    #[inline]
    #[must_use]
    pub fn path(&self) -> &[String] {
        match self {
            CycleErrorKind::CyclicDependency { path } => path,
        }
    }
}

impl Display for CycleErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CycleErrorKind::CyclicDependency { path } => {
                write!(f, "Circular dependency detected: ")?;
                let mut names = path.iter();
                if let Some(name) = names.next() {
                    write!(f, "{name}")?;
                }
                for name in names {
                    write!(f, " -> {name}")?;
                }
            }
        }
        Ok(())
    }
}
