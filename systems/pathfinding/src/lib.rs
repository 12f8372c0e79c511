#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Randomized route computation for viruses travelling through the network.
//!
//! Routes are computed once per virus at spawn time. A randomized walk biased
//! toward the destination runs first so that viruses of the same wave spread
//! across alternative branches. When the walk dead-ends or runs out of steps a
//! greedy depth-first search with backtracking takes over, which always finds a
//! route when the endpoints are connected.

use std::collections::{BTreeSet, VecDeque};

use log::debug;
use network_defence_core::{NodeId, RouteFailure, Topology, Vec2};
use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng,
};
use serde::{Deserialize, Serialize};

/// Number of best-scored neighbours considered by a randomized step.
const TOP_CHOICES: usize = 3;

/// Offset that keeps the inverse-distance score finite at the destination.
const SCORE_EPSILON: f32 = 0.1;

/// Tunables of the randomized walk.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    /// Probability that a step branches among the best neighbours instead of
    /// taking the nearest one.
    pub random_path_chance: f32,
    /// Maximum number of hops taken by the randomized walk.
    pub step_cap: usize,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            random_path_chance: 0.3,
            step_cap: 50,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    node: NodeId,
    score: f32,
}

/// Route planner that reuses scratch buffers between requests.
#[derive(Debug, Default)]
pub struct Pathfinder {
    config: PathfindingConfig,
    candidates: Vec<Candidate>,
}

impl Pathfinder {
    /// Creates a planner with the provided tunables.
    #[must_use]
    pub fn new(config: PathfindingConfig) -> Self {
        Self {
            config,
            candidates: Vec::new(),
        }
    }

    /// Tunables the planner was created with.
    #[must_use]
    pub fn config(&self) -> PathfindingConfig {
        self.config
    }

    /// Computes a route from `start` to `end`, both included.
    ///
    /// Consecutive nodes of the returned route are adjacent and no node is
    /// visited twice.
    pub fn compute_route<T, R>(
        &mut self,
        topology: &T,
        start: NodeId,
        end: NodeId,
        rng: &mut R,
    ) -> Result<Vec<NodeId>, RouteFailure>
    where
        T: Topology + ?Sized,
        R: Rng + ?Sized,
    {
        for node in [start, end] {
            if topology.position(node).is_none() {
                return Err(RouteFailure::UnknownNode { node });
            }
        }
        if start == end {
            return Ok(vec![start]);
        }
        if !connected(topology, start, end) {
            return Err(RouteFailure::Disconnected {
                from: start,
                to: end,
            });
        }

        if let Some(route) = self.randomized_walk(topology, start, end, rng) {
            return Ok(route);
        }

        debug!(
            "randomized walk from {:?} to {:?} failed, falling back to greedy search",
            start, end
        );
        greedy_search(topology, start, end).ok_or(RouteFailure::Exhausted {
            from: start,
            to: end,
        })
    }

    fn randomized_walk<T, R>(
        &mut self,
        topology: &T,
        start: NodeId,
        end: NodeId,
        rng: &mut R,
    ) -> Option<Vec<NodeId>>
    where
        T: Topology + ?Sized,
        R: Rng + ?Sized,
    {
        let target = topology.position(end)?;
        let mut route = vec![start];
        let mut visited = BTreeSet::from([start]);
        let mut current = start;

        for _ in 0..self.config.step_cap {
            if current == end {
                break;
            }

            let branch = rng.gen::<f32>() < self.config.random_path_chance;
            let next = if branch {
                self.weighted_neighbor(topology, current, target, &visited, rng)
            } else {
                nearest_neighbor(topology, current, target, &visited)
            };
            let Some(next) = next else {
                break;
            };

            let _ = visited.insert(next);
            route.push(next);
            current = next;
        }

        (current == end).then_some(route)
    }

    /// Picks among the best-scored unvisited neighbours, weighted by score.
    fn weighted_neighbor<T, R>(
        &mut self,
        topology: &T,
        current: NodeId,
        target: Vec2,
        visited: &BTreeSet<NodeId>,
        rng: &mut R,
    ) -> Option<NodeId>
    where
        T: Topology + ?Sized,
        R: Rng + ?Sized,
    {
        self.candidates.clear();
        for &neighbor in topology.neighbors(current) {
            if visited.contains(&neighbor) {
                continue;
            }
            let Some(position) = topology.position(neighbor) else {
                continue;
            };
            let jitter = rng.gen_range(0.8_f32..1.2);
            self.candidates.push(Candidate {
                node: neighbor,
                score: jitter / (position.distance(target) + SCORE_EPSILON),
            });
        }

        self.candidates
            .sort_by(|left, right| right.score.total_cmp(&left.score));
        let top = &self.candidates[..self.candidates.len().min(TOP_CHOICES)];
        let first = top.first()?;

        match WeightedIndex::new(top.iter().map(|candidate| candidate.score)) {
            Ok(weights) => Some(top[weights.sample(rng)].node),
            Err(_) => Some(first.node),
        }
    }
}

fn nearest_neighbor<T>(
    topology: &T,
    current: NodeId,
    target: Vec2,
    visited: &BTreeSet<NodeId>,
) -> Option<NodeId>
where
    T: Topology + ?Sized,
{
    topology
        .neighbors(current)
        .iter()
        .filter(|neighbor| !visited.contains(neighbor))
        .filter_map(|&neighbor| {
            topology
                .position(neighbor)
                .map(|position| (neighbor, position.distance(target)))
        })
        .min_by(|left, right| left.1.total_cmp(&right.1))
        .map(|(neighbor, _)| neighbor)
}

/// Unvisited neighbours ordered so that popping yields the nearest first.
fn ordered_options<T>(
    topology: &T,
    node: NodeId,
    target: Vec2,
    visited: &BTreeSet<NodeId>,
) -> Vec<NodeId>
where
    T: Topology + ?Sized,
{
    let mut options: Vec<(NodeId, f32)> = topology
        .neighbors(node)
        .iter()
        .filter(|neighbor| !visited.contains(neighbor))
        .filter_map(|&neighbor| {
            topology
                .position(neighbor)
                .map(|position| (neighbor, position.distance(target)))
        })
        .collect();
    options.sort_by(|left, right| right.1.total_cmp(&left.1).then(right.0.cmp(&left.0)));
    options.into_iter().map(|(neighbor, _)| neighbor).collect()
}

/// Depth-first search that always expands the neighbour nearest to `end`.
fn greedy_search<T>(topology: &T, start: NodeId, end: NodeId) -> Option<Vec<NodeId>>
where
    T: Topology + ?Sized,
{
    let target = topology.position(end)?;
    let mut visited = BTreeSet::from([start]);
    let mut route = vec![start];
    let mut frontier = vec![ordered_options(topology, start, target, &visited)];

    while let Some(options) = frontier.last_mut() {
        match options.pop() {
            Some(next) if visited.contains(&next) => {}
            Some(next) => {
                let _ = visited.insert(next);
                route.push(next);
                if next == end {
                    return Some(route);
                }
                let expanded = ordered_options(topology, next, target, &visited);
                frontier.push(expanded);
            }
            None => {
                let _ = frontier.pop();
                let _ = route.pop();
            }
        }
    }

    None
}

/// Breadth-first reachability check between two nodes.
fn connected<T>(topology: &T, start: NodeId, end: NodeId) -> bool
where
    T: Topology + ?Sized,
{
    let mut visited = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        for &neighbor in topology.neighbors(node) {
            if neighbor == end {
                return true;
            }
            if visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Graph {
        positions: BTreeMap<NodeId, Vec2>,
        adjacency: BTreeMap<NodeId, Vec<NodeId>>,
    }

    impl Graph {
        fn new(points: &[(u32, f32, f32)], edges: &[(u32, u32)]) -> Self {
            let positions = points
                .iter()
                .map(|&(id, x, y)| (NodeId::new(id), Vec2::new(x, y)))
                .collect();
            let mut adjacency: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
            for &(a, b) in edges {
                adjacency.entry(NodeId::new(a)).or_default().push(NodeId::new(b));
                adjacency.entry(NodeId::new(b)).or_default().push(NodeId::new(a));
            }
            Self {
                positions,
                adjacency,
            }
        }
    }

    impl Topology for Graph {
        fn position(&self, node: NodeId) -> Option<Vec2> {
            self.positions.get(&node).copied()
        }

        fn neighbors(&self, node: NodeId) -> &[NodeId] {
            self.adjacency.get(&node).map_or(&[], Vec::as_slice)
        }
    }

    fn never_branch() -> Pathfinder {
        Pathfinder::new(PathfindingConfig {
            random_path_chance: 0.0,
            step_cap: 50,
        })
    }

    #[test]
    fn greedy_walk_follows_nearest_neighbor() {
        // 0 - 1 - 3 and 0 - 2 - 3 where 1 lies closer to 3.
        let graph = Graph::new(
            &[(0, 0.0, 0.0), (1, 1.0, 0.2), (2, 1.0, -2.0), (3, 2.0, 0.0)],
            &[(0, 1), (1, 3), (0, 2), (2, 3)],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let route = never_branch()
            .compute_route(&graph, NodeId::new(0), NodeId::new(3), &mut rng)
            .expect("route exists");
        assert_eq!(route, vec![NodeId::new(0), NodeId::new(1), NodeId::new(3)]);
    }

    #[test]
    fn fallback_backtracks_out_of_dead_ends() {
        // The nearest neighbour of 0 is a dead end at 1; the real path detours through 2.
        let graph = Graph::new(
            &[(0, 0.0, 0.0), (1, 4.0, 0.0), (2, 0.0, 3.0), (3, 5.0, 0.0)],
            &[(0, 1), (0, 2), (2, 3)],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let route = never_branch()
            .compute_route(&graph, NodeId::new(0), NodeId::new(3), &mut rng)
            .expect("route exists");
        assert_eq!(route, vec![NodeId::new(0), NodeId::new(2), NodeId::new(3)]);
    }

    #[test]
    fn disconnected_endpoints_are_reported() {
        let graph = Graph::new(&[(0, 0.0, 0.0), (1, 1.0, 0.0), (2, 5.0, 0.0)], &[(0, 1)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let error = never_branch()
            .compute_route(&graph, NodeId::new(0), NodeId::new(2), &mut rng)
            .unwrap_err();
        assert_eq!(
            error,
            RouteFailure::Disconnected {
                from: NodeId::new(0),
                to: NodeId::new(2),
            }
        );
    }

    #[test]
    fn unknown_endpoints_are_reported() {
        let graph = Graph::new(&[(0, 0.0, 0.0)], &[]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let error = never_branch()
            .compute_route(&graph, NodeId::new(0), NodeId::new(9), &mut rng)
            .unwrap_err();
        assert_eq!(error, RouteFailure::UnknownNode { node: NodeId::new(9) });
    }

    #[test]
    fn trivial_route_contains_only_the_start() {
        let graph = Graph::new(&[(0, 0.0, 0.0)], &[]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let route = never_branch()
            .compute_route(&graph, NodeId::new(0), NodeId::new(0), &mut rng)
            .expect("trivial route");
        assert_eq!(route, vec![NodeId::new(0)]);
    }

    #[test]
    fn step_cap_forces_the_fallback() {
        let points: Vec<(u32, f32, f32)> = (0..10).map(|i| (i, i as f32, 0.0)).collect();
        let edges: Vec<(u32, u32)> = (0..9).map(|i| (i, i + 1)).collect();
        let graph = Graph::new(&points, &edges);
        let mut pathfinder = Pathfinder::new(PathfindingConfig {
            random_path_chance: 0.0,
            step_cap: 2,
        });
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let route = pathfinder
            .compute_route(&graph, NodeId::new(0), NodeId::new(9), &mut rng)
            .expect("route exists");
        assert_eq!(route.len(), 10);
    }
}
