use tracing::{debug, error};

use crate::{
    any::TypeInfo,
    dependency::{DependencyDescriptor, DependencyTarget},
    errors::{CycleErrorKind, ResolveErrorKind},
    graph::DependencyGraph,
    registry::BeanDefinitionRegistry,
};

/// Resolves dependency descriptors to bean names over a registry snapshot.
#[derive(Clone, Copy)]
pub struct DependencyResolver<'a> {
    registry: &'a BeanDefinitionRegistry,
}

impl<'a> DependencyResolver<'a> {
    #[inline]
    #[must_use]
    pub const fn new(registry: &'a BeanDefinitionRegistry) -> Self {
        Self { registry }
    }

    /// Name of the only bean of `type_info`.
    /// If there are several candidates, exactly one of them must be primary.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NoDefinitionOfType`] if there is no candidate
    /// - Returns [`ResolveErrorKind::NoUniqueDefinition`] if candidates are ambiguous
    pub fn unique_name_of_type(&self, type_info: &TypeInfo) -> Result<&'a str, ResolveErrorKind> {
        let candidates = self.registry.names_of_type(type_info);

        match candidates {
            [] => Err(ResolveErrorKind::NoDefinitionOfType { type_info: *type_info }),
            [name] => Ok(name.as_str()),
            _ => {
                let mut primaries = candidates.iter().filter(|name| {
                    self.registry
                        .get(name)
                        .is_ok_and(|definition| definition.is_primary())
                });

                match (primaries.next(), primaries.next()) {
                    (Some(name), None) => {
                        debug!(bean = name.as_str(), type_name = type_info.short_name(), "Primary candidate chosen");
                        Ok(name.as_str())
                    }
                    _ => Err(ResolveErrorKind::NoUniqueDefinition {
                        type_info: *type_info,
                        candidates: candidates.to_vec(),
                    }),
                }
            }
        }
    }

    /// Target of a dependency without creating anything.
    ///
    /// A qualifier names the target directly, otherwise the unique bean of the required type is used.
    /// Collection dependencies target every bean of the type in registration order.
    /// Returns `Ok(None)` if nothing matches, so unresolved dependencies surface at creation time.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::NoUniqueDefinition`] if the required type is ambiguous
    pub fn resolve_target(&self, descriptor: &DependencyDescriptor) -> Result<Option<DependencyTarget>, ResolveErrorKind> {
        if descriptor.collection {
            return Ok(Some(DependencyTarget::Collection(
                self.registry.names_of_type(&descriptor.required_type).to_vec(),
            )));
        }

        if let Some(qualifier) = &descriptor.qualifier {
            return Ok(self
                .registry
                .contains(qualifier)
                .then(|| DependencyTarget::Single(qualifier.clone())));
        }

        match self.unique_name_of_type(&descriptor.required_type) {
            Ok(name) => Ok(Some(DependencyTarget::Single(name.to_owned()))),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Graph of every registered definition and its resolvable dependencies,
    /// including the factory bean of a factory method.
    /// Unresolvable and ambiguous dependencies add no edge.
    #[must_use]
    pub fn build_graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::new();

        for definition in self.registry.definitions() {
            graph.add_node(definition.name());

            for descriptor in definition.dependencies() {
                match self.resolve_target(descriptor) {
                    Ok(Some(target)) => {
                        for name in target.names() {
                            graph.add_edge(definition.name(), name.as_str());
                        }
                    }
                    Ok(None) => {
                        debug!(bean = definition.name(), dependency = descriptor.name, "Dependency unresolved, no edge added");
                    }
                    Err(err) => {
                        debug!(bean = definition.name(), dependency = descriptor.name, "No edge added: {}", err);
                    }
                }
            }

            if let Some(factory_bean) = definition.factory_method().and_then(|method| method.factory_bean()) {
                if self.registry.contains(factory_bean) {
                    graph.add_edge(definition.name(), factory_bean);
                }
            }
        }
        graph
    }

    /// Builds the graph and checks it for cycles.
    ///
    /// # Errors
    /// Returns [`CycleErrorKind::CyclicDependency`] with the first cycle found
    pub fn validate_all(&self) -> Result<DependencyGraph, CycleErrorKind> {
        let graph = self.build_graph();

        match graph.all_cycles().into_iter().next() {
            Some(path) => {
                let err = CycleErrorKind::CyclicDependency { path };
                error!("{}", err);
                Err(err)
            }
            None => {
                debug!(beans = graph.len(), "Dependency graph is acyclic");
                Ok(graph)
            }
        }
    }
}
