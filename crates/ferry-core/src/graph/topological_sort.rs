// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Kahn's algorithm, used to prove a dependency graph is acyclic.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// An error indicating that a cycle was detected in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<T> {
    /// Nodes that could not be ordered: each is on, or downstream of, a cycle.
    pub unresolved: Vec<T>,
}

/// Performs a topological sort on a directed graph.
///
/// # Arguments
///
/// * `nodes`: The unique nodes of the graph. Their order is kept among nodes
///   that are ready at the same time.
/// * `edges`: Directed edges as `(before, after)` tuples. Edges naming an
///   unknown node are ignored.
///
/// # Returns
///
/// * `Ok(Vec<T>)`: The nodes in a valid order.
/// * `Err(CycleError)`: The nodes that could not be ordered.
pub fn topological_sort<T>(
    nodes: impl IntoIterator<Item = T>,
    edges: impl IntoIterator<Item = (T, T)>,
) -> Result<Vec<T>, CycleError<T>>
where
    T: Copy + Eq + Hash,
{
    let node_list: Vec<T> = nodes.into_iter().collect();
    if node_list.is_empty() {
        return Ok(Vec::new());
    }

    let mut adjacency_list: HashMap<T, Vec<T>> = HashMap::new();
    let mut in_degree: HashMap<T, usize> = node_list.iter().map(|id| (*id, 0)).collect();

    for (before, after) in edges {
        if !in_degree.contains_key(&before) {
            continue;
        }
        if let Some(degree) = in_degree.get_mut(&after) {
            *degree += 1;
            adjacency_list.entry(before).or_default().push(after);
        }
    }

    let mut queue: VecDeque<T> = node_list
        .iter()
        .copied()
        .filter(|node| in_degree.get(node).copied().unwrap_or(0) == 0)
        .collect();

    let mut sorted_list = Vec::with_capacity(node_list.len());
    while let Some(node) = queue.pop_front() {
        sorted_list.push(node);
        if let Some(successors) = adjacency_list.get(&node) {
            for &next in successors {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }
    }

    if sorted_list.len() != node_list.len() {
        let unresolved = node_list
            .into_iter()
            .filter(|node| in_degree.get(node).copied().unwrap_or(0) > 0)
            .collect();
        Err(CycleError { unresolved })
    } else {
        Ok(sorted_list)
    }
}
