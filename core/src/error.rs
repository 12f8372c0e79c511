//! Error taxonomy shared by the world, the systems and the adapters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::NodeId;

/// Problems with level or wave configuration that prevent a subsystem from starting.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The scheduler was asked to run without any configured waves.
    #[error("no waves are configured")]
    NoWaves,
    /// The network does not contain any spawn nodes.
    #[error("the network has no spawn nodes")]
    NoSpawnNodes,
    /// The network does not contain a critical node.
    #[error("the network has no critical node")]
    MissingCriticalNode,
    /// The network declares more than one critical node.
    #[error("the network declares {count} critical nodes")]
    MultipleCriticalNodes {
        /// Number of critical nodes found in the layout.
        count: usize,
    },
    /// A node cannot reach the critical node.
    #[error("node {node:?} cannot reach the critical node")]
    DisconnectedCritical {
        /// Node that was found to be cut off.
        node: NodeId,
    },
    /// A wave definition violates its constraints.
    #[error("wave {index} is invalid: {reason}")]
    InvalidWave {
        /// Zero-based index of the offending wave.
        index: usize,
        /// Human-readable description of the violation.
        reason: String,
    },
    /// An edge references a node key that the layout does not define.
    #[error("edge references unknown node key {key}")]
    UnknownEdgeEndpoint {
        /// Level-local key of the missing node.
        key: u32,
    },
    /// Two nodes in the layout share the same key.
    #[error("node key {key} is declared twice")]
    DuplicateNodeKey {
        /// Level-local key that was repeated.
        key: u32,
    },
    /// An edge connects a node to itself.
    #[error("node key {key} is connected to itself")]
    SelfLoop {
        /// Level-local key of the looping node.
        key: u32,
    },
}

/// Failures raised by the economy ledger.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceError {
    /// The ledger does not hold enough money for the purchase.
    #[error("insufficient funds: {required} required, {available} available")]
    InsufficientFunds {
        /// Price of the rejected purchase.
        required: u32,
        /// Money held when the purchase was attempted.
        available: u32,
    },
}

/// Reasons the pathfinder could not produce a route.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RouteFailure {
    /// No path exists between the endpoints.
    #[error("{from:?} and {to:?} are not connected")]
    Disconnected {
        /// Requested route origin.
        from: NodeId,
        /// Requested route destination.
        to: NodeId,
    },
    /// One of the endpoints is not part of the network.
    #[error("node {node:?} is not part of the network")]
    UnknownNode {
        /// Node that could not be found.
        node: NodeId,
    },
    /// Both search passes ran out of steps before reaching the destination.
    #[error("route search from {from:?} to {to:?} exhausted its step budget")]
    Exhausted {
        /// Requested route origin.
        from: NodeId,
        /// Requested route destination.
        to: NodeId,
    },
    /// The network has no spawn node to start a route from.
    #[error("no spawn node is available")]
    NoSpawnNode,
    /// The network has no critical node to route towards.
    #[error("no critical node is available")]
    NoCriticalNode,
}

/// Reasons a tower build request may be rejected.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// The requested node does not exist.
    #[error("the node does not exist")]
    NodeMissing,
    /// The node is occupied, reserved or too far from existing towers.
    #[error("the node is not buildable")]
    NotBuildable,
    /// The player cannot afford the tower.
    #[error(transparent)]
    Funds(#[from] ResourceError),
    /// The game already reached a terminal outcome.
    #[error("the game is over")]
    GameOver,
}

/// Reasons a tower upgrade request may be rejected.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum UpgradeError {
    /// No tower with the provided identifier exists.
    #[error("the tower does not exist")]
    TowerMissing,
    /// The tower already reached the maximum level.
    #[error("the tower is already at maximum level")]
    MaxLevel,
    /// The player cannot afford the upgrade.
    #[error(transparent)]
    Funds(#[from] ResourceError),
    /// The game already reached a terminal outcome.
    #[error("the game is over")]
    GameOver,
}

/// Reasons a tower sale may be rejected.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SellError {
    /// No tower with the provided identifier exists.
    #[error("the tower does not exist")]
    TowerMissing,
    /// The game already reached a terminal outcome.
    #[error("the game is over")]
    GameOver,
}
