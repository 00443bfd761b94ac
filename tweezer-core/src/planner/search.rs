//! Uniform-cost shortest path search over the planning grid

use alloc::collections::BinaryHeap;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Reverse;

use super::grid::Grid;

/// Result of a shortest-path search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Node indices from source to target, if the target was reached
    pub path: Option<Vec<usize>>,
    /// Number of nodes settled before the search stopped
    pub iterations: usize,
}

/// Dijkstra from `source` to `target`
///
/// Entering a node costs its grid weight. The queue is keyed by
/// `(cost, node)` so equal-cost nodes settle lowest index first, which
/// keeps the chosen path reproducible. Settling is capped at the node
/// count so a sealed-off target terminates.
pub fn shortest_path(grid: &Grid, source: usize, target: usize) -> SearchOutcome {
    let n = grid.node_count();
    if source >= n || target >= n {
        return SearchOutcome {
            path: None,
            iterations: 0,
        };
    }

    let mut cost = vec![u32::MAX; n];
    let mut parent: Vec<Option<usize>> = vec![None; n];
    let mut settled = vec![false; n];
    let mut queue = BinaryHeap::new();

    cost[source] = 0;
    queue.push(Reverse((0u32, source)));

    let mut iterations = 0;
    while let Some(Reverse((c, node))) = queue.pop() {
        if settled[node] {
            continue;
        }
        if iterations >= n {
            break;
        }
        settled[node] = true;
        iterations += 1;

        if node == target {
            break;
        }

        for next in grid.neighbours(node) {
            if settled[next] {
                continue;
            }
            let candidate = c.saturating_add(grid.weight(next));
            if candidate < cost[next] {
                cost[next] = candidate;
                parent[next] = Some(node);
                queue.push(Reverse((candidate, next)));
            }
        }
    }

    if !settled[target] {
        return SearchOutcome {
            path: None,
            iterations,
        };
    }

    let mut path = vec![target];
    let mut at = target;
    while let Some(p) = parent[at] {
        path.push(p);
        at = p;
    }
    path.reverse();

    SearchOutcome {
        path: Some(path),
        iterations,
    }
}
