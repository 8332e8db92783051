//! Dependency ordering of testing services.
//!
//! Services declare the service types they depend on; an edge is drawn from
//! every registered instance matching a declared type to the declaring
//! service. The execution order is computed with Kahn's algorithm. Roots and
//! freed vertices are enqueued in input order, so the result is deterministic
//! for a given registration order.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::error::{HarnessError, HarnessResult};
use crate::key::ServiceType;

/// A vertex of the testing-service dependency graph.
pub trait DependencyNode {
    /// Name used in cycle diagnostics.
    fn name(&self) -> &'static str;

    /// Types this vertex satisfies when another vertex depends on them.
    fn service_types(&self) -> &[ServiceType];

    /// Types this vertex depends on.
    fn dependencies(&self) -> &[ServiceType];
}

/// Orders `nodes` so that every vertex comes after all vertices it depends on.
///
/// A dependency type matched by no vertex adds no edge. A dependency type
/// matched by several vertices adds an edge from each of them.
///
/// # Errors
///
/// [`HarnessError::DependencyCycle`] naming the vertices left unordered when
/// the graph is cyclic, a vertex depending on its own type included.
pub fn in_order<T: DependencyNode>(nodes: Vec<T>) -> HarnessResult<Vec<T>> {
    let mut providers: HashMap<ServiceType, Vec<usize>> = HashMap::new();
    for (index, node) in nodes.iter().enumerate() {
        for service_type in node.service_types() {
            let entry = providers.entry(*service_type).or_default();
            if entry.last() != Some(&index) {
                entry.push(index);
            }
        }
    }

    let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); nodes.len()];
    let mut in_degree = vec![0usize; nodes.len()];
    for (dependent, node) in nodes.iter().enumerate() {
        for dependency in node.dependencies() {
            let Some(matches) = providers.get(dependency) else {
                continue;
            };
            for &provider in matches {
                if successors[provider].insert(dependent) {
                    in_degree[dependent] += 1;
                }
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&v| in_degree[v] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(vertex) = queue.pop_front() {
        order.push(vertex);
        for &successor in &successors[vertex] {
            in_degree[successor] -= 1;
            if in_degree[successor] == 0 {
                queue.push_back(successor);
            }
        }
    }

    if order.len() < nodes.len() {
        let remaining = (0..nodes.len())
            .filter(|&v| in_degree[v] > 0)
            .map(|v| nodes[v].name())
            .collect();
        return Err(HarnessError::DependencyCycle(remaining));
    }

    let mut slots: Vec<Option<T>> = nodes.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|vertex| slots[vertex].take())
        .collect())
}
