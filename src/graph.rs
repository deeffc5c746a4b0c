use std::collections::{btree_set, BTreeMap, BTreeSet, VecDeque};

use crate::errors::CycleErrorKind;

static NO_EDGES: BTreeSet<String> = BTreeSet::new();

/// Directed "bean depends on bean" graph with its reverse.
///
/// Traversals use explicit stacks, so deep dependency chains don't grow the call stack,
/// and visit nodes in name order, so results are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    dependencies: BTreeMap<String, BTreeSet<String>>,
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.dependents.entry(name.clone()).or_default();
        self.dependencies.entry(name).or_default();
    }

    /// Adds the edge `from` depends on `to`, adding missing nodes
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let (from, to) = (from.into(), to.into());
        self.add_node(from.clone());
        self.add_node(to.clone());

        self.dependents.entry(to.clone()).or_default().insert(from.clone());
        self.dependencies.entry(from).or_default().insert(to);
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    pub fn dependencies_of(&self, name: &str) -> impl Iterator<Item = &str> {
        self.edges(name).iter().map(String::as_str)
    }

    pub fn dependents_of(&self, name: &str) -> impl Iterator<Item = &str> {
        self.dependents.get(name).unwrap_or(&NO_EDGES).iter().map(String::as_str)
    }

    fn edges(&self, name: &str) -> &BTreeSet<String> {
        self.dependencies.get(name).unwrap_or(&NO_EDGES)
    }

    /// Depth-first walk from `root` skipping `done` nodes, calling `on_finish` for each node
    /// once all of its dependencies are finished.
    ///
    /// Returns the first cycle found, from the first occurrence of the repeated node to the node itself.
    /// Finished nodes and, on a cycle, the nodes of the cycle are added to `done`.
    /// The path leading to the cycle stays searchable, it may reach other cycles.
    fn walk<'g>(
        &'g self,
        root: &'g str,
        done: &mut BTreeSet<&'g str>,
        mut on_finish: impl FnMut(&'g str),
    ) -> Option<Vec<String>> {
        if done.contains(root) || !self.contains(root) {
            return None;
        }

        let mut path: Vec<&'g str> = vec![root];
        let mut on_path: BTreeSet<&'g str> = BTreeSet::from([root]);
        let mut stack: Vec<btree_set::Iter<'g, String>> = vec![self.edges(root).iter()];

        while let Some(edges) = stack.last_mut() {
            match edges.next() {
                Some(next) => {
                    let next = next.as_str();
                    if on_path.contains(next) {
                        let start = path.iter().position(|node| *node == next).unwrap_or(0);
                        let mut cycle = path[start..].iter().map(|node| (*node).to_owned()).collect::<Vec<_>>();
                        cycle.push(next.to_owned());

                        done.extend(&path[start..]);
                        return Some(cycle);
                    }
                    if done.contains(next) {
                        continue;
                    }

                    path.push(next);
                    on_path.insert(next);
                    stack.push(self.edges(next).iter());
                }
                None => {
                    stack.pop();
                    if let Some(finished) = path.pop() {
                        on_path.remove(finished);
                        done.insert(finished);
                        on_finish(finished);
                    }
                }
            }
        }
        None
    }

    /// Cycle reachable from `name`, if any.
    ///
    /// The path runs from the first occurrence of the repeated node to the node itself,
    /// so a self-dependency is `[name, name]`.
    #[must_use]
    pub fn cycle_path(&self, name: &str) -> Option<Vec<String>> {
        self.walk(name, &mut BTreeSet::new(), |_| {})
    }

    #[inline]
    #[must_use]
    pub fn has_cycle(&self, name: &str) -> bool {
        self.cycle_path(name).is_some()
    }

    /// Independent cycles of the whole graph.
    ///
    /// Every node is used as a search root at most once across the call,
    /// and the nodes of a found cycle aren't searched again, so a ring is reported once.
    /// Cycles sharing no node are reported separately.
    #[must_use]
    pub fn all_cycles(&self) -> Vec<Vec<String>> {
        let mut done = BTreeSet::new();
        let mut cycles = Vec::new();

        for root in self.nodes() {
            if let Some(cycle) = self.walk(root, &mut done, |_| {}) {
                cycles.push(cycle);
            }
        }
        cycles
    }

    /// Every node exactly once, each after all of its dependencies (Kahn's algorithm).
    ///
    /// # Errors
    /// Returns [`CycleErrorKind::CyclicDependency`] with one of the cycles if the graph isn't acyclic
    pub fn creation_order(&self) -> Result<Vec<String>, CycleErrorKind> {
        let mut pending = self
            .dependencies
            .iter()
            .map(|(name, dependencies)| (name.as_str(), dependencies.len()))
            .collect::<BTreeMap<_, _>>();
        let mut ready = pending
            .iter()
            .filter_map(|(name, count)| (*count == 0).then_some(*name))
            .collect::<VecDeque<_>>();

        let mut order = Vec::with_capacity(self.len());
        while let Some(name) = ready.pop_front() {
            order.push(name.to_owned());

            for dependent in self.dependents_of(name) {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
        }

        if order.len() == self.len() {
            return Ok(order);
        }

        let path = self.all_cycles().into_iter().next().unwrap_or_else(|| {
            pending
                .into_iter()
                .filter_map(|(name, count)| (count > 0).then(|| name.to_owned()))
                .collect()
        });
        Err(CycleErrorKind::CyclicDependency { path })
    }

    /// Creation order of `name` and everything it depends on, dependencies first, `name` last.
    /// Empty for an unknown node.
    ///
    /// # Errors
    /// Returns [`CycleErrorKind::CyclicDependency`] if a cycle is reachable from `name`
    pub fn dependency_chain(&self, name: &str) -> Result<Vec<String>, CycleErrorKind> {
        let mut order = Vec::new();
        match self.walk(name, &mut BTreeSet::new(), |finished| order.push(finished.to_owned())) {
            Some(path) => Err(CycleErrorKind::CyclicDependency { path }),
            None => Ok(order),
        }
    }
}
