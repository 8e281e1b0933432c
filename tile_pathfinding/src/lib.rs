use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;

/// A trait for graphs that can be flooded.
///
/// `Node`: The type of node identifiers (e.g., a tile coordinate).
/// `Ctx`: A context object passed to cost calculations (e.g., a snapshot and the moving unit).
pub trait Graph<Node, Ctx> {
    /// Return the neighbors of a node.
    fn neighbors(&self, node: Node, context: &Ctx) -> Vec<Node>;

    /// Cost to enter `to` from `from`, or `None` if the step is impassable.
    fn cost(&self, from: Node, to: Node, context: &Ctx) -> Option<u32>;
}

/// Budget-limited uniform-cost search.
pub struct Reach;

impl Reach {
    /// Every node reachable from `start` with a total cost of at most `budget`,
    /// mapped to its cheapest cost. `start` is always included at cost 0.
    pub fn within<Node, Ctx, G>(graph: &G, start: Node, budget: u32, context: &Ctx) -> HashMap<Node, u32>
    where
        Node: Copy + Eq + Hash,
        G: Graph<Node, Ctx>,
    {
        let mut best: HashMap<Node, u32> = HashMap::new();
        let mut open = BinaryHeap::new();

        best.insert(start, 0);
        open.push(State { node: start, cost: 0 });

        while let Some(State { node, cost }) = open.pop() {
            // Stale heap entry
            if cost > best.get(&node).copied().unwrap_or(u32::MAX) {
                continue;
            }

            for neighbor in graph.neighbors(node, context) {
                let Some(step) = graph.cost(node, neighbor, context) else {
                    continue;
                };
                let next = cost.saturating_add(step);
                if next > budget {
                    continue;
                }
                if next < best.get(&neighbor).copied().unwrap_or(u32::MAX) {
                    best.insert(neighbor, next);
                    open.push(State { node: neighbor, cost: next });
                }
            }
        }

        best
    }
}

/// Helper struct for the priority queue.
#[derive(Copy, Clone, Eq, PartialEq)]
struct State<Node> {
    node: Node,
    cost: u32,
}

// Flip the ordering so the max-heap pops the cheapest entry first.
impl<Node: Eq> Ord for State<Node> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.cmp(&self.cost)
    }
}

impl<Node: Eq> PartialOrd for State<Node> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 5x5 open grid, nodes are (x, y)
    struct OpenGrid;

    impl Graph<(i32, i32), ()> for OpenGrid {
        fn neighbors(&self, (x, y): (i32, i32), _context: &()) -> Vec<(i32, i32)> {
            [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
                .into_iter()
                .filter(|&(nx, ny)| (0..5).contains(&nx) && (0..5).contains(&ny))
                .collect()
        }

        fn cost(&self, _from: (i32, i32), _to: (i32, i32), _context: &()) -> Option<u32> {
            Some(1)
        }
    }

    #[test]
    fn test_open_grid_diamond() {
        let reach = Reach::within(&OpenGrid, (2, 2), 2, &());
        // Radius-2 diamond fits entirely inside the 5x5 board: 1 + 4 + 8
        assert_eq!(reach.len(), 13);
        assert_eq!(reach[&(2, 2)], 0);
        assert_eq!(reach[&(2, 0)], 2);
        assert!(!reach.contains_key(&(0, 0)));
    }

    #[test]
    fn test_zero_budget_is_start_only() {
        let reach = Reach::within(&OpenGrid, (0, 0), 0, &());
        assert_eq!(reach.len(), 1);
    }

    // 0 -> 1 (cost 10), 0 -> 2 (cost 1), 2 -> 1 (cost 1), 1 -> 3 impassable
    struct WeightedGraph;

    impl Graph<u32, ()> for WeightedGraph {
        fn neighbors(&self, node: u32, _context: &()) -> Vec<u32> {
            match node {
                0 => vec![1, 2],
                1 => vec![3],
                2 => vec![1],
                _ => vec![],
            }
        }

        fn cost(&self, from: u32, to: u32, _context: &()) -> Option<u32> {
            match (from, to) {
                (0, 1) => Some(10),
                (1, 3) => None,
                _ => Some(1),
            }
        }
    }

    #[test]
    fn test_cheaper_detour_wins() {
        let reach = Reach::within(&WeightedGraph, 0, 5, &());
        assert_eq!(reach.get(&1), Some(&2));
        assert_eq!(reach.get(&2), Some(&1));
        assert!(!reach.contains_key(&3));
    }
}
