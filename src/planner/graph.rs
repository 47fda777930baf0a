//! Region adjacency graph and breadth-first shortest paths.

use std::collections::VecDeque;

use super::regions::{ArenaGrid, RegionId};

/// Undirected adjacency over region ids. Forbidden regions get no edges at
/// all, so traversal can never enter or leave them.
#[derive(Clone, Debug)]
pub struct AdjacencyGraph {
    adjacency: Vec<Vec<RegionId>>,
}

impl AdjacencyGraph {
    /// Connect each region to its orthogonal (and, when enabled, diagonal)
    /// neighbors, skipping any edge touching a forbidden region.
    pub fn build(grid: &ArenaGrid, forbidden: &[RegionId], allow_diagonals: bool) -> Self {
        let count = grid.region_count();
        let mut adjacency = vec![Vec::new(); count];
        let blocked = |id: RegionId| forbidden.contains(&id);

        for id in 0..count {
            if blocked(id) {
                continue;
            }
            let col = grid.col(id);
            let row = grid.row(id);

            let mut candidates: Vec<RegionId> = Vec::with_capacity(4);
            if col + 1 < grid.cols {
                candidates.push(id + 1);
            }
            if row + 1 < grid.rows {
                candidates.push(id + grid.cols);
                if allow_diagonals {
                    if col > 0 {
                        candidates.push(id + grid.cols - 1);
                    }
                    if col + 1 < grid.cols {
                        candidates.push(id + grid.cols + 1);
                    }
                }
            }

            for other in candidates {
                if !blocked(other) {
                    adjacency[id].push(other);
                    adjacency[other].push(id);
                }
            }
        }

        Self { adjacency }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn neighbors(&self, id: RegionId) -> &[RegionId] {
        &self.adjacency[id]
    }

    /// BFS shortest path, both endpoints inclusive. Empty when `end` is
    /// unreachable from `start`.
    pub fn shortest_path(&self, start: RegionId, end: RegionId) -> Vec<RegionId> {
        if start >= self.adjacency.len() || end >= self.adjacency.len() {
            return Vec::new();
        }
        if start == end {
            return vec![start];
        }

        let mut parent: Vec<Option<RegionId>> = vec![None; self.adjacency.len()];
        let mut visited = vec![false; self.adjacency.len()];
        let mut queue = VecDeque::new();
        visited[start] = true;
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            if node == end {
                break;
            }
            for &next in &self.adjacency[node] {
                if !visited[next] {
                    visited[next] = true;
                    parent[next] = Some(node);
                    queue.push_back(next);
                }
            }
        }

        if !visited[end] {
            return Vec::new();
        }

        let mut path = vec![end];
        let mut node = end;
        while let Some(prev) = parent[node] {
            path.push(prev);
            node = prev;
        }
        path.reverse();
        path
    }

    /// Edge count of the shortest path, `None` when unreachable.
    pub fn distance(&self, start: RegionId, end: RegionId) -> Option<usize> {
        let path = self.shortest_path(start, end);
        if path.is_empty() {
            None
        } else {
            Some(path.len() - 1)
        }
    }
}
