use core::any::type_name;

use crate::any::Bean;

/// Hook around the post-construct callbacks of every bean created by a factory.
///
/// A processor may return a different instance (a proxy or a wrapper),
/// the next processor and the callers of the factory see the replacement.
/// Processors run in registration order.
pub trait BeanPostProcessor: Send + Sync {
    /// Called after injection, before the post-construct callbacks
    ///
    /// # Errors
    /// An error here fails the creation of the bean
    fn before_initialization(&self, bean: Bean, _name: &str) -> anyhow::Result<Bean> {
        Ok(bean)
    }

    /// Called after the post-construct callbacks
    ///
    /// # Errors
    /// An error here fails the creation of the bean
    fn after_initialization(&self, bean: Bean, _name: &str) -> anyhow::Result<Bean> {
        Ok(bean)
    }

    fn name(&self) -> &str {
        type_name::<Self>()
    }
}
