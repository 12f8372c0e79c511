//! Undirected node graph with breadth-first reachability and buildability tracking.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use network_defence_core::{
    node_name, ConfigurationError, NetworkLayout, NodeId, NodeRole, Topology, TowerId, Vec2,
};

use crate::registry::Table;

/// State of a single network node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeState {
    key: u32,
    role: NodeRole,
    position: Vec2,
    neighbors: Vec<NodeId>,
    occupant: Option<TowerId>,
    buildable: bool,
}

impl NodeState {
    /// Level-local key the node was declared with.
    #[must_use]
    pub fn key(&self) -> u32 {
        self.key
    }

    /// Role the node plays in the network.
    #[must_use]
    pub fn role(&self) -> NodeRole {
        self.role
    }

    /// World position of the node.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Adjacent nodes in ascending identifier order.
    #[must_use]
    pub fn neighbors(&self) -> &[NodeId] {
        &self.neighbors
    }

    /// Tower currently placed on the node, if any.
    #[must_use]
    pub fn occupant(&self) -> Option<TowerId> {
        self.occupant
    }
}

/// Network of nodes that connects spawn points to the critical node.
///
/// Adjacency is fixed once a layout is configured; only occupancy changes at
/// runtime. Buildability is cached per node and refreshed only inside the
/// `max_build_distance` neighbourhood of a placement or removal.
#[derive(Clone, Debug)]
pub struct NodeGraph {
    nodes: Table<NodeId, NodeState>,
    keys: BTreeMap<u32, NodeId>,
    critical: Option<NodeId>,
    spawns: Vec<NodeId>,
    fault: Option<ConfigurationError>,
    max_build_distance: u32,
}

impl NodeGraph {
    pub(crate) fn new(max_build_distance: u32) -> Self {
        Self {
            nodes: Table::new(),
            keys: BTreeMap::new(),
            critical: None,
            spawns: Vec::new(),
            fault: None,
            max_build_distance,
        }
    }

    /// Discards all nodes and restarts the node sequence counter.
    pub(crate) fn reset(&mut self) {
        self.nodes.reset();
        self.keys.clear();
        self.critical = None;
        self.spawns.clear();
        self.fault = None;
    }

    /// Replaces the current network with the provided layout.
    ///
    /// Structural problems (duplicate keys, dangling or looping edges) leave
    /// the graph empty. Connectivity problems keep the nodes but record a
    /// fault that forces every node to be unbuildable.
    pub(crate) fn configure(&mut self, layout: &NetworkLayout) -> Result<(), ConfigurationError> {
        self.nodes.clear();
        self.keys.clear();
        self.critical = None;
        self.spawns.clear();
        self.fault = None;

        if let Err(error) = self.load(layout) {
            self.nodes.clear();
            self.keys.clear();
            self.spawns.clear();
            self.critical = None;
            return Err(error);
        }

        if let Err(error) = self.check_connectivity() {
            self.fault = Some(error.clone());
            let _ = self.refresh_all();
            return Err(error);
        }

        let _ = self.refresh_all();
        Ok(())
    }

    fn load(&mut self, layout: &NetworkLayout) -> Result<(), ConfigurationError> {
        for spec in &layout.nodes {
            if self.keys.contains_key(&spec.key) {
                return Err(ConfigurationError::DuplicateNodeKey { key: spec.key });
            }
            let state = NodeState {
                key: spec.key,
                role: spec.role,
                position: spec.position,
                neighbors: Vec::new(),
                occupant: None,
                buildable: false,
            };
            let id = self.nodes.register(node_name, state);
            let _ = self.keys.insert(spec.key, id);
            match spec.role {
                NodeRole::Spawn => self.spawns.push(id),
                NodeRole::Critical => self.critical = self.critical.or(Some(id)),
                NodeRole::Normal => {}
            }
        }

        let mut adjacency: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for &(a, b) in &layout.edges {
            if a == b {
                return Err(ConfigurationError::SelfLoop { key: a });
            }
            let first = self.lookup_key(a)?;
            let second = self.lookup_key(b)?;
            let _ = adjacency.entry(first).or_default().insert(second);
            let _ = adjacency.entry(second).or_default().insert(first);
        }

        for (id, neighbors) in adjacency {
            if let Some(node) = self.nodes.get_mut(id) {
                node.neighbors = neighbors.into_iter().collect();
            }
        }

        Ok(())
    }

    fn lookup_key(&self, key: u32) -> Result<NodeId, ConfigurationError> {
        self.keys
            .get(&key)
            .copied()
            .ok_or(ConfigurationError::UnknownEdgeEndpoint { key })
    }

    fn check_connectivity(&self) -> Result<(), ConfigurationError> {
        let critical_count = self
            .nodes
            .iter()
            .filter(|(_, node)| node.role == NodeRole::Critical)
            .count();
        if critical_count > 1 {
            return Err(ConfigurationError::MultipleCriticalNodes {
                count: critical_count,
            });
        }

        let critical = self
            .critical
            .ok_or(ConfigurationError::MissingCriticalNode)?;

        for &spawn in &self.spawns {
            if self.distance(spawn, critical).is_none() {
                return Err(ConfigurationError::DisconnectedCritical { node: spawn });
            }
        }
        Ok(())
    }

    /// Unweighted hop count of the shortest path between two nodes.
    ///
    /// Returns `None` when either node is unknown or no path exists.
    #[must_use]
    pub fn distance(&self, from: NodeId, to: NodeId) -> Option<u32> {
        if !self.nodes.contains(from) || !self.nodes.contains(to) {
            return None;
        }
        if from == to {
            return Some(0);
        }

        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        let _ = visited.insert(from);
        queue.push_back((from, 0_u32));

        while let Some((node, distance)) = queue.pop_front() {
            for &neighbor in self.neighbors(node) {
                if neighbor == to {
                    return Some(distance + 1);
                }
                if visited.insert(neighbor) {
                    queue.push_back((neighbor, distance + 1));
                }
            }
        }

        None
    }

    /// Every node within `radius` hops of `center`, including `center` itself.
    #[must_use]
    pub fn nodes_within(&self, center: NodeId, radius: u32) -> Vec<NodeId> {
        if !self.nodes.contains(center) {
            return Vec::new();
        }

        let mut reached = BTreeSet::new();
        let mut queue = VecDeque::new();
        let _ = reached.insert(center);
        queue.push_back((center, 0_u32));

        while let Some((node, distance)) = queue.pop_front() {
            if distance >= radius {
                continue;
            }
            for &neighbor in self.neighbors(node) {
                if reached.insert(neighbor) {
                    queue.push_back((neighbor, distance + 1));
                }
            }
        }

        reached.into_iter().collect()
    }

    /// Cached buildability flag of the node; unknown nodes are never buildable.
    #[must_use]
    pub fn is_buildable(&self, node: NodeId) -> bool {
        self.nodes.get(node).is_some_and(|state| state.buildable)
    }

    fn evaluate_buildable(&self, node: NodeId) -> bool {
        if self.fault.is_some() {
            return false;
        }
        let Some(state) = self.nodes.get(node) else {
            return false;
        };
        if state.role != NodeRole::Normal || state.occupant.is_some() {
            return false;
        }

        self.nodes_within(node, self.max_build_distance)
            .into_iter()
            .any(|candidate| self.is_build_source(candidate))
    }

    fn is_build_source(&self, node: NodeId) -> bool {
        self.critical == Some(node)
            || self
                .nodes
                .get(node)
                .is_some_and(|state| state.occupant.is_some())
    }

    /// Re-evaluates every node, returning the flags that flipped.
    pub(crate) fn refresh_all(&mut self) -> Vec<(NodeId, bool)> {
        let ids = self.nodes.ids();
        self.refresh(ids)
    }

    /// Re-evaluates the neighbourhood affected by an occupancy change at `center`.
    pub(crate) fn refresh_around(&mut self, center: NodeId) -> Vec<(NodeId, bool)> {
        let affected = self.nodes_within(center, self.max_build_distance);
        self.refresh(affected)
    }

    fn refresh(&mut self, nodes: Vec<NodeId>) -> Vec<(NodeId, bool)> {
        let mut changed = Vec::new();
        for node in nodes {
            let buildable = self.evaluate_buildable(node);
            if let Some(state) = self.nodes.get_mut(node) {
                if state.buildable != buildable {
                    state.buildable = buildable;
                    changed.push((node, buildable));
                }
            }
        }
        changed
    }

    pub(crate) fn occupy(&mut self, node: NodeId, tower: TowerId) {
        if let Some(state) = self.nodes.get_mut(node) {
            state.occupant = Some(tower);
        }
    }

    pub(crate) fn vacate(&mut self, node: NodeId) {
        if let Some(state) = self.nodes.get_mut(node) {
            state.occupant = None;
        }
    }

    /// State of the provided node, if it exists.
    #[must_use]
    pub fn node(&self, node: NodeId) -> Option<&NodeState> {
        self.nodes.get(node)
    }

    pub(crate) fn name(&self, node: NodeId) -> Option<&str> {
        self.nodes.name(node)
    }

    /// Identifier of the node declared with the provided level key.
    #[must_use]
    pub fn node_for_key(&self, key: u32) -> Option<NodeId> {
        self.keys.get(&key).copied()
    }

    /// Identifiers of every node in ascending order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.ids()
    }

    /// The critical node, if the layout declared one.
    #[must_use]
    pub fn critical(&self) -> Option<NodeId> {
        self.critical
    }

    /// Nodes flagged as spawn points.
    #[must_use]
    pub fn spawn_nodes(&self) -> &[NodeId] {
        &self.spawns
    }

    /// Configuration problem detected when the layout was loaded, if any.
    #[must_use]
    pub fn fault(&self) -> Option<&ConfigurationError> {
        self.fault.as_ref()
    }

    /// Number of nodes in the network.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Reports whether the network has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    /// Hop radius used by the buildability rule.
    #[must_use]
    pub fn max_build_distance(&self) -> u32 {
        self.max_build_distance
    }
}

impl Topology for NodeGraph {
    fn position(&self, node: NodeId) -> Option<Vec2> {
        self.nodes.get(node).map(|state| state.position)
    }

    fn neighbors(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node)
            .map_or(&[], |state| state.neighbors.as_slice())
    }
}
