use core::any::TypeId;

use crate::any::TypeInfo;

/// Error raised by user code run during bean creation or destruction:
/// constructors, factory methods, injectors, lifecycle callbacks and post-processors.
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("Incorrect instance type. Actual: {actual:?}, expected: {expected}")]
    IncorrectType { expected: TypeInfo, actual: TypeId },
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
