use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

use crate::{any::TypeInfo, definition::BeanDefinition, errors::DefinitionErrorKind};

/// One definition per bean name, indexed by the types each bean can be looked up by.
#[derive(Clone, Default)]
pub struct BeanDefinitionRegistry {
    definitions: BTreeMap<String, Arc<BeanDefinition>>,
    /// Names in registration order
    order: Vec<String>,
    by_type: BTreeMap<TypeInfo, Vec<String>>,
}

impl BeanDefinitionRegistry {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns [`DefinitionErrorKind::Duplicate`] if a definition with the same name is registered
    pub fn register(&mut self, definition: BeanDefinition) -> Result<(), DefinitionErrorKind> {
        let name = definition.name().to_owned();
        if self.definitions.contains_key(&name) {
            return Err(DefinitionErrorKind::Duplicate { name });
        }

        for type_info in core::iter::once(definition.type_info()).chain(definition.assignable_to().iter().copied()) {
            self.by_type.entry(type_info).or_default().push(name.clone());
        }

        debug!(bean = name, type_name = definition.type_info().short_name(), "Definition registered");
        self.order.push(name.clone());
        self.definitions.insert(name, Arc::new(definition));
        Ok(())
    }

    /// # Errors
    /// Returns [`DefinitionErrorKind::NoSuchDefinition`] if there is no definition with this name
    pub fn get(&self, name: &str) -> Result<&Arc<BeanDefinition>, DefinitionErrorKind> {
        self.definitions
            .get(name)
            .ok_or_else(|| DefinitionErrorKind::NoSuchDefinition { name: name.to_owned() })
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Names of the beans whose type equals or is assignable to `type_info`, in registration order
    #[must_use]
    pub fn names_of_type(&self, type_info: &TypeInfo) -> &[String] {
        self.by_type.get(type_info).map(Vec::as_slice).unwrap_or_default()
    }

    /// Names in registration order
    #[inline]
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Definitions in registration order
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<BeanDefinition>> {
        self.order.iter().filter_map(|name| self.definitions.get(name))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::BeanDefinitionRegistry;
    use crate::{any::TypeInfo, definition::BeanDefinition, errors::DefinitionErrorKind};

    use tracing_test::traced_test;

    trait Repository: Send + Sync {}

    struct InMemory;
    struct Postgres;

    impl Repository for InMemory {}
    impl Repository for Postgres {}

    #[test]
    #[traced_test]
    fn test_register_and_get() {
        let mut registry = BeanDefinitionRegistry::new();
        registry
            .register(BeanDefinition::builder("inMemory", |_| Ok(InMemory)).build())
            .unwrap();

        assert_eq!(registry.get("inMemory").unwrap().name(), "inMemory");
        assert!(matches!(
            registry.get("postgres"),
            Err(DefinitionErrorKind::NoSuchDefinition { .. })
        ));
        assert!(logs_contain("Definition registered"));
    }

    #[test]
    fn test_duplicate() {
        let mut registry = BeanDefinitionRegistry::new();
        registry.register(BeanDefinition::builder("a", |_| Ok(InMemory)).build()).unwrap();

        let err = registry
            .register(BeanDefinition::builder("a", |_| Ok(Postgres)).build())
            .unwrap_err();

        assert_eq!(err, DefinitionErrorKind::Duplicate { name: "a".to_owned() });
        assert_eq!(registry.len(), 1);
        assert!(registry.names_of_type(&TypeInfo::of::<Postgres>()).is_empty());
    }

    #[test]
    fn test_names_of_type() {
        let mut registry = BeanDefinitionRegistry::new();
        for definition in [
            BeanDefinition::builder("postgres", |_| Ok(Postgres))
                .assignable_to::<dyn Repository>()
                .build(),
            BeanDefinition::builder("other", |_| Ok(0u8)).build(),
            BeanDefinition::builder("inMemory", |_| Ok(InMemory))
                .assignable_to::<dyn Repository>()
                .build(),
        ] {
            registry.register(definition).unwrap();
        }

        assert_eq!(registry.names_of_type(&TypeInfo::of::<dyn Repository>()), ["postgres", "inMemory"]);
        assert_eq!(registry.names_of_type(&TypeInfo::of::<InMemory>()), ["inMemory"]);
        assert_eq!(registry.names(), ["postgres", "other", "inMemory"]);
        assert_eq!(
            registry.definitions().map(|definition| definition.name()).collect::<Vec<_>>(),
            ["postgres", "other", "inMemory"]
        );
    }
}
