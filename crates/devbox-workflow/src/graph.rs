//! Dependency ordering for provisioning steps.
//!
//! Steps are ordered with Kahn's algorithm. Among the steps whose
//! dependencies are all placed, the one declared first goes next, so a list
//! that is already in a valid order is returned unchanged.

use devbox_error::ConfigurationError;
use std::collections::{BTreeSet, HashMap};

/// Name and dependencies of a step, detached from its probe/apply closures.
#[derive(Debug, Clone, Copy)]
pub struct StepNode<'s> {
    pub name: &'s str,
    pub depends_on: &'s [String],
}

/// Validate the step graph and return step indices in execution order.
pub fn execution_order(nodes: &[StepNode<'_>]) -> Result<Vec<usize>, ConfigurationError> {
    let index = index_by_name(nodes)?;

    // deps[i]: distinct dependency indices of node i
    let mut deps: Vec<BTreeSet<usize>> = Vec::with_capacity(nodes.len());
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        let mut set = BTreeSet::new();
        for dep in node.depends_on {
            if dep == node.name {
                return Err(ConfigurationError::SelfDependency(node.name.to_string()));
            }
            let &d = index
                .get(dep.as_str())
                .ok_or_else(|| ConfigurationError::UnknownDependency {
                    step: node.name.to_string(),
                    dependency: dep.clone(),
                })?;
            if set.insert(d) {
                dependents[d].push(i);
            }
        }
        deps.push(set);
    }

    let mut pending: Vec<usize> = deps.iter().map(BTreeSet::len).collect();
    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() != nodes.len() {
        return Err(ConfigurationError::DependencyCycle(find_cycle(
            nodes, &deps, &pending,
        )));
    }
    Ok(order)
}

fn index_by_name<'s>(
    nodes: &[StepNode<'s>],
) -> Result<HashMap<&'s str, usize>, ConfigurationError> {
    let mut index = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        if node.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName(i));
        }
        if index.insert(node.name, i).is_some() {
            return Err(ConfigurationError::DuplicateStep(node.name.to_string()));
        }
    }
    Ok(index)
}

/// Every node left with pending dependencies after Kahn's pass has at least
/// one pending dependency, so following them must revisit a node.
fn find_cycle(nodes: &[StepNode<'_>], deps: &[BTreeSet<usize>], pending: &[usize]) -> Vec<String> {
    let stuck = |i: usize| pending[i] > 0;
    let Some(start) = (0..nodes.len()).find(|&i| stuck(i)) else {
        return Vec::new();
    };

    let mut path: Vec<usize> = Vec::new();
    let mut current = start;
    loop {
        if let Some(pos) = path.iter().position(|&p| p == current) {
            let mut cycle: Vec<String> = path[pos..]
                .iter()
                .map(|&i| nodes[i].name.to_string())
                .collect();
            cycle.push(nodes[current].name.to_string());
            return cycle;
        }
        path.push(current);
        match deps[current].iter().copied().find(|&d| stuck(d)) {
            Some(next) => current = next,
            None => return path.iter().map(|&i| nodes[i].name.to_string()).collect(),
        }
    }
}
