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

//! Transitive dependency closure in load order.

use std::collections::HashSet;

/// Computes the transitive dependency closure of `root` in load order.
///
/// The walk is depth-first over `dependencies_of`, visiting dependencies in
/// their declared order and emitting each node after all of its dependencies
/// (post-order). `root` is always the last element. Every node is visited at
/// most once even when reachable through several paths; a back edge to a node
/// still being expanded is skipped instead of looping.
///
/// The first error returned by `dependencies_of` aborts the walk.
pub fn dependency_closure<E>(
    root: &str,
    mut dependencies_of: impl FnMut(&str) -> Result<Vec<String>, E>,
) -> Result<Vec<String>, E> {
    let mut order = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    // (node, its dependencies, index of the next dependency to expand)
    let mut stack: Vec<(String, Vec<String>, usize)> = Vec::new();

    visited.insert(root.to_string());
    stack.push((root.to_string(), dependencies_of(root)?, 0));

    while let Some((_, deps, next)) = stack.last_mut() {
        if let Some(dep) = deps.get(*next).cloned() {
            *next += 1;
            if visited.insert(dep.clone()) {
                let sub = dependencies_of(&dep)?;
                stack.push((dep, sub, 0));
            }
        } else if let Some((node, _, _)) = stack.pop() {
            order.push(node);
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn graph(edges: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        edges
            .iter()
            .map(|(n, deps)| (n.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    fn closure_of(g: &HashMap<String, Vec<String>>, root: &str) -> Vec<String> {
        dependency_closure::<()>(root, |n| Ok(g.get(n).cloned().unwrap_or_default())).unwrap()
    }

    #[test]
    fn dependencies_come_before_dependents() {
        let g = graph(&[("level1/env", &["level1/shared"]), ("level1/shared", &[])]);
        assert_eq!(closure_of(&g, "level1/env"), ["level1/shared", "level1/env"]);
    }

    #[test]
    fn diamond_visits_shared_node_once() {
        let g = graph(&[
            ("top", &["left", "right"]),
            ("left", &["base"]),
            ("right", &["base"]),
            ("base", &[]),
        ]);
        assert_eq!(closure_of(&g, "top"), ["base", "left", "right", "top"]);
    }

    #[test]
    fn declared_order_is_kept() {
        let g = graph(&[("root", &["b", "a", "c"])]);
        assert_eq!(closure_of(&g, "root"), ["b", "a", "c", "root"]);
    }

    #[test]
    fn back_edges_do_not_loop() {
        let g = graph(&[("a", &["b"]), ("b", &["a"])]);
        assert_eq!(closure_of(&g, "a"), ["b", "a"]);
    }

    #[test]
    fn lookup_errors_abort() {
        let result = dependency_closure("root", |n| {
            if n == "root" {
                Ok(vec!["missing".to_string()])
            } else {
                Err(n.to_string())
            }
        });
        assert_eq!(result, Err("missing".to_string()));
    }
}
