/// Property-based tests for dependency ordering
///
/// These tests verify that the computed execution order honors every
/// declared edge for arbitrary acyclic graphs, regardless of registration
/// order, and that every cycle is rejected.

use ferrous_testkit::{in_order, DependencyNode, HarnessError, ServiceType};
use proptest::prelude::*;

const MAX_NODES: usize = 10;

struct T0;
struct T1;
struct T2;
struct T3;
struct T4;
struct T5;
struct T6;
struct T7;
struct T8;
struct T9;

const NAMES: [&str; MAX_NODES] = ["n0", "n1", "n2", "n3", "n4", "n5", "n6", "n7", "n8", "n9"];

fn service_types() -> [ServiceType; MAX_NODES] {
    [
        ServiceType::of::<T0>(),
        ServiceType::of::<T1>(),
        ServiceType::of::<T2>(),
        ServiceType::of::<T3>(),
        ServiceType::of::<T4>(),
        ServiceType::of::<T5>(),
        ServiceType::of::<T6>(),
        ServiceType::of::<T7>(),
        ServiceType::of::<T8>(),
        ServiceType::of::<T9>(),
    ]
}

#[derive(Debug)]
struct Node {
    id: usize,
    types: Vec<ServiceType>,
    deps: Vec<ServiceType>,
}

impl DependencyNode for Node {
    fn name(&self) -> &'static str {
        NAMES[self.id]
    }

    fn service_types(&self) -> &[ServiceType] {
        &self.types
    }

    fn dependencies(&self) -> &[ServiceType] {
        &self.deps
    }
}

/// Builds nodes in `registration` order; `edges` are (dependent, dependency).
fn build(registration: &[usize], edges: &[(usize, usize)]) -> Vec<Node> {
    let types = service_types();
    registration
        .iter()
        .map(|&id| Node {
            id,
            types: vec![types[id]],
            deps: edges
                .iter()
                .filter(|(dependent, _)| *dependent == id)
                .map(|(_, dependency)| types[*dependency])
                .collect(),
        })
        .collect()
}

/// Random DAG: edges always point from a higher to a lower id.
fn dag() -> impl Strategy<Value = (Vec<usize>, Vec<(usize, usize)>)> {
    (1..=MAX_NODES).prop_flat_map(|n| {
        let edges = prop::collection::vec((0..n, 0..n), 0..n * 2).prop_map(|pairs| {
            pairs
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| (a.max(b), a.min(b)))
                .collect::<Vec<_>>()
        });
        let registration = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
        (registration, edges)
    })
}

proptest! {
    #[test]
    fn every_edge_is_honored((registration, edges) in dag()) {
        let ordered = in_order(build(&registration, &edges)).unwrap();
        let position = |id: usize| ordered.iter().position(|node| node.id == id).unwrap();

        prop_assert_eq!(ordered.len(), registration.len());
        for (dependent, dependency) in &edges {
            prop_assert!(position(*dependency) < position(*dependent));
        }
    }
}

proptest! {
    #[test]
    fn ordering_is_a_permutation((registration, edges) in dag()) {
        let ordered = in_order(build(&registration, &edges)).unwrap();

        let mut ids: Vec<usize> = ordered.iter().map(|node| node.id).collect();
        ids.sort_unstable();
        let mut expected = registration.clone();
        expected.sort_unstable();
        prop_assert_eq!(ids, expected);
    }
}

proptest! {
    #[test]
    fn ordering_is_deterministic((registration, edges) in dag()) {
        let first: Vec<usize> = in_order(build(&registration, &edges)).unwrap().iter().map(|n| n.id).collect();
        let second: Vec<usize> = in_order(build(&registration, &edges)).unwrap().iter().map(|n| n.id).collect();
        prop_assert_eq!(first, second);
    }
}

proptest! {
    #[test]
    fn every_ring_is_a_cycle(n in 2..=MAX_NODES, extra in 0..MAX_NODES) {
        // Ring 0 -> 1 -> ... -> n-1 -> 0, plus one node outside the ring when room allows
        let mut edges: Vec<(usize, usize)> = (0..n).map(|i| (i, (i + 1) % n)).collect();
        let mut registration: Vec<usize> = (0..n).collect();
        if n < MAX_NODES && extra % 2 == 0 {
            registration.push(n);
            edges.push((n, 0));
        }

        match in_order(build(&registration, &edges)) {
            Err(HarnessError::DependencyCycle(names)) => {
                prop_assert!(names.len() >= n);
                for id in 0..n {
                    prop_assert!(names.contains(&NAMES[id]));
                }
            }
            other => prop_assert!(false, "expected a cycle, got {:?}", other.map(|v| v.len())),
        }
    }
}
