use crate::any::TypeInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InjectionKind {
    Constructor,
    Setter,
    Field,
}

/// What a dependency resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyTarget {
    /// The single bean with this name.
    Single(String),
    /// Every bean assignable to the required type, in registration order.
    Collection(Vec<String>),
}

impl DependencyTarget {
    #[inline]
    #[must_use]
    pub fn names(&self) -> &[String] {
        match self {
            DependencyTarget::Single(name) => core::slice::from_ref(name),
            DependencyTarget::Collection(names) => names,
        }
    }
}

/// One dependency requirement of a bean.
///
/// A descriptor either names its target with a qualifier,
/// or is resolved by its required type, which must match a single bean (or a single primary one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDescriptor {
    pub name: String,
    pub required_type: TypeInfo,
    pub required: bool,
    pub qualifier: Option<String>,
    pub injection_kind: InjectionKind,
    pub collection: bool,
}

impl DependencyDescriptor {
    /// Dependency resolved by the unique bean of type `T`
    #[inline]
    #[must_use]
    pub fn of_type<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_type: TypeInfo::of::<T>(),
            required: true,
            qualifier: None,
            injection_kind: InjectionKind::Constructor,
            collection: false,
        }
    }

    /// Dependency resolved by the bean named `qualifier`
    #[inline]
    #[must_use]
    pub fn qualified<T: ?Sized + 'static>(name: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self::of_type::<T>(name).with_qualifier(qualifier)
    }

    /// Dependency on every bean assignable to `T`.
    /// An empty match resolves to an empty collection.
    #[inline]
    #[must_use]
    pub fn all_of_type<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            collection: true,
            required: false,
            ..Self::of_type::<T>(name)
        }
    }

    #[inline]
    #[must_use]
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    #[inline]
    #[must_use]
    pub(crate) fn with_kind(mut self, injection_kind: InjectionKind) -> Self {
        self.injection_kind = injection_kind;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{DependencyDescriptor, DependencyTarget, InjectionKind};
    use crate::any::TypeInfo;

    struct Repository;

    #[test]
    fn test_descriptor_builders() {
        let by_type = DependencyDescriptor::of_type::<Repository>("repo");
        assert!(by_type.required);
        assert!(by_type.qualifier.is_none());
        assert_eq!(by_type.required_type, TypeInfo::of::<Repository>());
        assert_eq!(by_type.injection_kind, InjectionKind::Constructor);

        let qualified = DependencyDescriptor::qualified::<Repository>("repo", "primaryRepository").optional();
        assert!(!qualified.required);
        assert_eq!(qualified.qualifier.as_deref(), Some("primaryRepository"));

        let all = DependencyDescriptor::all_of_type::<Repository>("repos");
        assert!(all.collection);
        assert!(!all.required);
    }

    #[test]
    fn test_target_names() {
        assert_eq!(DependencyTarget::Single("a".to_owned()).names(), ["a"]);
        assert!(DependencyTarget::Collection(Vec::new()).names().is_empty());
    }
}
