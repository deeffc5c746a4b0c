use std::sync::Arc;

use crate::{
    any::{Bean, TypeInfo},
    errors::ResolveErrorKind,
};

#[derive(Clone)]
pub(crate) enum Resolved {
    Single(Option<Bean>),
    Collection(Vec<(String, Bean)>),
}

/// Constructor-kind dependencies of a bean, resolved in declaration order.
///
/// Handed to the constructor or factory method of a definition,
/// values are looked up by the descriptor name and downcast to the expected type.
#[derive(Clone, Default)]
pub struct ResolvedDependencies {
    entries: Vec<(String, Resolved)>,
    factory_bean: Option<(String, Bean)>,
}

impl ResolvedDependencies {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn push(&mut self, name: impl Into<String>, resolved: Resolved) {
        self.entries.push((name.into(), resolved));
    }

    #[inline]
    pub(crate) fn set_factory_bean(&mut self, name: impl Into<String>, bean: Bean) {
        self.factory_bean = Some((name.into(), bean));
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    fn entry(&self, name: &str) -> Result<&Resolved, ResolveErrorKind> {
        self.entries
            .iter()
            .find_map(|(entry_name, resolved)| (entry_name == name).then_some(resolved))
            .ok_or_else(|| ResolveErrorKind::UnresolvedDependency { name: name.to_owned() })
    }

    /// Erased value of a single dependency, `None` if it's optional and wasn't found
    #[must_use]
    pub fn bean(&self, name: &str) -> Option<&Bean> {
        match self.entry(name) {
            Ok(Resolved::Single(bean)) => bean.as_ref(),
            _ => None,
        }
    }

    /// Gets an optional single dependency.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::UnresolvedDependency`] if no single dependency with this name was declared
    /// - Returns [`ResolveErrorKind::IncorrectType`] if the bean isn't a `T`
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        match self.entry(name)? {
            Resolved::Single(Some(bean)) => downcast_bean(name, bean.clone()).map(Some),
            Resolved::Single(None) => Ok(None),
            Resolved::Collection(_) => Err(ResolveErrorKind::UnresolvedDependency { name: name.to_owned() }),
        }
    }

    /// Gets a single dependency that must be present.
    ///
    /// # Errors
    /// Same as [`Self::get`], and [`ResolveErrorKind::UnresolvedDependency`] if an optional dependency is absent.
    pub fn require<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ResolveErrorKind> {
        self.get(name)?
            .ok_or_else(|| ResolveErrorKind::UnresolvedDependency { name: name.to_owned() })
    }

    /// Gets every bean of a collection dependency.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::UnresolvedDependency`] if no collection dependency with this name was declared
    /// - Returns [`ResolveErrorKind::IncorrectType`] if one of the beans isn't a `T`
    pub fn all<T: Send + Sync + 'static>(&self, name: &str) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        match self.entry(name)? {
            Resolved::Collection(beans) => beans
                .iter()
                .map(|(bean_name, bean)| downcast_bean(bean_name, bean.clone()))
                .collect(),
            Resolved::Single(_) => Err(ResolveErrorKind::UnresolvedDependency { name: name.to_owned() }),
        }
    }

    /// Gets the bean that owns the factory method being invoked.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::UnresolvedDependency`] if the definition has no factory bean
    /// - Returns [`ResolveErrorKind::IncorrectType`] if the factory bean isn't a `T`
    pub fn factory_bean<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        match &self.factory_bean {
            Some((name, bean)) => downcast_bean(name, bean.clone()),
            None => Err(ResolveErrorKind::UnresolvedDependency {
                name: "<factory bean>".to_owned(),
            }),
        }
    }
}

pub(crate) fn downcast_bean<T: Send + Sync + 'static>(name: &str, bean: Bean) -> Result<Arc<T>, ResolveErrorKind> {
    bean.downcast::<T>().map_err(|bean| ResolveErrorKind::IncorrectType {
        name: name.to_owned(),
        expected: TypeInfo::of::<T>(),
        actual: (*bean).type_id(),
    })
}
