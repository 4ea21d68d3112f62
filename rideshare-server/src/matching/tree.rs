//! Search tree pruning and flattening.
//!
//! The search builds a forest of [`ClassifiedRoute`]s: primaries at the
//! root, secondaries and tertiaries below. Branches that never reach the
//! rider's destination are pruned, then every root-to-node path ending at a
//! node that does reach it becomes one candidate chain.

use super::classifier::{ClassifiedRoute, Classification};

/// Drop every branch that cannot reach the destination.
///
/// Primaries and secondaries survive if they reach the destination
/// themselves or keep at least one surviving child. Tertiaries survive only
/// if they reach it.
pub fn prune(roots: Vec<ClassifiedRoute>) -> Vec<ClassifiedRoute> {
    roots.into_iter().filter_map(prune_node).collect()
}

fn prune_node(mut node: ClassifiedRoute) -> Option<ClassifiedRoute> {
    let children = std::mem::take(&mut node.children);

    if node.classification == Classification::Tertiary {
        return node.reaches_destination().then_some(node);
    }

    let children: Vec<ClassifiedRoute> = children.into_iter().filter_map(prune_node).collect();

    if node.reaches_destination() || !children.is_empty() {
        Some(node.with_children(children))
    } else {
        None
    }
}

/// Every root-to-node path that ends at the destination.
///
/// A node that reaches the destination and also has surviving children
/// yields its own path plus those of its descendants.
pub fn flatten(roots: &[ClassifiedRoute]) -> Vec<Vec<&ClassifiedRoute>> {
    let mut paths = Vec::new();
    let mut prefix = Vec::new();
    for root in roots {
        collect_paths(root, &mut prefix, &mut paths);
    }
    paths
}

fn collect_paths<'a>(
    node: &'a ClassifiedRoute,
    prefix: &mut Vec<&'a ClassifiedRoute>,
    paths: &mut Vec<Vec<&'a ClassifiedRoute>>,
) {
    prefix.push(node);
    if node.reaches_destination() {
        paths.push(prefix.clone());
    }
    for child in &node.children {
        collect_paths(child, prefix, paths);
    }
    prefix.pop();
}

/// Total number of routes in the forest.
pub fn count(roots: &[ClassifiedRoute]) -> usize {
    roots.iter().map(|node| 1 + count(&node.children)).sum()
}
