#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Network Defence simulation.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to. Systems consume event streams, query immutable snapshots, and
//! respond exclusively with new command batches.

mod error;
mod stats;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use error::{
    BuildError, ConfigurationError, ResourceError, RouteFailure, SellError, UpgradeError,
};
pub use glam::Vec2;
pub use stats::{next_upgrade_cost, TowerTier, VirusProfile, MAX_TOWER_LEVEL, UPGRADE_COST_GROWTH};

/// Identifier types allocated sequentially by the entity registry.
pub trait EntityId: Copy + Ord + std::fmt::Debug {
    /// Builds an identifier from a registry sequence number.
    fn from_sequence(value: u32) -> Self;

    /// Retrieves the numeric representation of the identifier.
    fn get(&self) -> u32;
}

/// Unique identifier assigned to a network node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a new node identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }
}

impl EntityId for NodeId {
    fn from_sequence(value: u32) -> Self {
        Self(value)
    }

    fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a tower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TowerId(u32);

impl TowerId {
    /// Creates a new tower identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }
}

impl EntityId for TowerId {
    fn from_sequence(value: u32) -> Self {
        Self(value)
    }

    fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a virus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VirusId(u32);

impl VirusId {
    /// Creates a new virus identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }
}

impl EntityId for VirusId {
    fn from_sequence(value: u32) -> Self {
        Self(value)
    }

    fn get(&self) -> u32 {
        self.0
    }
}

/// Role a node plays in the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Ordinary node that may host a tower.
    Normal,
    /// Entry point where viruses appear.
    Spawn,
    /// Node the viruses try to reach.
    Critical,
}

/// Tower archetypes available to the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TowerKind {
    /// Slows and lightly damages every virus in range.
    Slow,
    /// Hits the nearest virus in range.
    Damage,
    /// Splashes damage around the centroid of the viruses in range.
    Aoe,
    /// Buffs nearby non-support towers.
    Support,
}

impl TowerKind {
    /// Every tower kind in menu order.
    pub const ALL: [TowerKind; 4] = [Self::Slow, Self::Damage, Self::Aoe, Self::Support];

    /// Short label used in entity names and narration.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Slow => "Slow",
            Self::Damage => "Damage",
            Self::Aoe => "AOE",
            Self::Support => "Support",
        }
    }

    /// Diagnostic name of a tower of this kind with the provided identifier.
    #[must_use]
    pub fn name_for(self, tower: TowerId) -> String {
        format!("Tower_{}_#{:03}", self.label(), tower.get())
    }
}

/// Virus archetypes spawned by waves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VirusKind {
    /// Balanced health and speed.
    Normal,
    /// Fragile but quick.
    Fast,
    /// Slow and durable.
    Tank,
}

impl VirusKind {
    /// Every virus kind in sampling order.
    pub const ALL: [VirusKind; 3] = [Self::Normal, Self::Fast, Self::Tank];

    /// Short label used in entity names and narration.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Fast => "Fast",
            Self::Tank => "Tank",
        }
    }

    /// Diagnostic name of a virus of this kind with the provided identifier.
    #[must_use]
    pub fn name_for(self, virus: VirusId) -> String {
        format!("Virus_{}_#{:03}", self.label(), virus.get())
    }
}

/// Diagnostic name of the node with the provided identifier.
#[must_use]
pub fn node_name(node: NodeId) -> String {
    format!("Node_#{:03}", node.get())
}

/// Immutable description of a single wave.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveConfig {
    /// Number of viruses spawned during the wave.
    pub virus_count: u32,
    /// Delay between consecutive spawns.
    pub spawn_interval: Duration,
    /// Probability that a spawned virus is [`VirusKind::Normal`].
    pub normal_chance: f32,
    /// Probability that a spawned virus is [`VirusKind::Fast`].
    pub fast_chance: f32,
}

impl WaveConfig {
    /// Creates a new wave description.
    #[must_use]
    pub const fn new(
        virus_count: u32,
        spawn_interval: Duration,
        normal_chance: f32,
        fast_chance: f32,
    ) -> Self {
        Self {
            virus_count,
            spawn_interval,
            normal_chance,
            fast_chance,
        }
    }

    /// Checks the probability and count constraints of the wave.
    pub fn validate(&self, index: usize) -> Result<(), ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidWave {
            index,
            reason: reason.to_owned(),
        };

        if self.virus_count == 0 {
            return Err(invalid("virus count must be positive"));
        }
        if !(0.0..=1.0).contains(&self.normal_chance) || !(0.0..=1.0).contains(&self.fast_chance)
        {
            return Err(invalid("spawn chances must lie within [0, 1]"));
        }
        if self.normal_chance + self.fast_chance > 1.0 + f32::EPSILON {
            return Err(invalid("spawn chances must not sum above 1"));
        }
        Ok(())
    }

    /// Maps a uniform roll in `[0, 1)` onto the cumulative archetype buckets.
    #[must_use]
    pub fn sample_kind(&self, roll: f32) -> VirusKind {
        if roll < self.normal_chance {
            VirusKind::Normal
        } else if roll < self.normal_chance + self.fast_chance {
            VirusKind::Fast
        } else {
            VirusKind::Tank
        }
    }
}

/// Phase of the wave state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WavePhase {
    /// Countdown before the next wave; towers stay idle.
    Preparation,
    /// Viruses are being spawned or are still alive.
    SpawningWave,
    /// Every virus of the wave has been resolved.
    WaveCleanup,
}

/// Terminal state of a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The game is still being played.
    InProgress,
    /// Every wave was cleared.
    Victory,
    /// The critical node's health pool was depleted.
    Defeat,
}

impl Outcome {
    /// Reports whether the outcome halts the simulation.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// Node description produced by the level-setup collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Level-local key used by edges to reference the node.
    pub key: u32,
    /// Role the node plays.
    pub role: NodeRole,
    /// World position of the node.
    pub position: Vec2,
}

/// Complete node set and adjacency of a level.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkLayout {
    /// Nodes making up the network.
    pub nodes: Vec<NodeSpec>,
    /// Undirected edges expressed as pairs of node keys.
    pub edges: Vec<(u32, u32)>,
}

/// Read-only access to node positions and adjacency.
pub trait Topology {
    /// World position of the node, if it exists.
    fn position(&self, node: NodeId) -> Option<Vec2>;

    /// Nodes adjacent to the provided node; empty for unknown nodes.
    fn neighbors(&self, node: NodeId) -> &[NodeId];
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Replaces the node graph with the provided layout.
    ConfigureNetwork {
        /// Layout produced by the level-setup collaborator.
        layout: NetworkLayout,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Suspends or resumes all per-tick advancement.
    SetPaused {
        /// Whether the simulation should be paused.
        paused: bool,
    },
    /// Discards every entity and resets counters, ledger and outcome.
    Restart,
    /// Requests construction of a tower on a node.
    BuildTower {
        /// Node that should host the tower.
        node: NodeId,
        /// Archetype of the requested tower.
        kind: TowerKind,
    },
    /// Requests an upgrade of an existing tower.
    UpgradeTower {
        /// Tower to upgrade.
        tower: TowerId,
    },
    /// Requests the sale of an existing tower.
    SellTower {
        /// Tower to sell.
        tower: TowerId,
    },
    /// Enters the preparation phase with the provided countdown.
    BeginPreparation {
        /// Length of the countdown.
        duration: Duration,
    },
    /// Enters the spawning phase of a wave.
    BeginWave {
        /// One-based wave number.
        wave: u32,
        /// Number of viruses the wave will spawn.
        virus_count: u32,
    },
    /// Spawns a virus that will follow the provided route.
    SpawnVirus {
        /// Archetype of the virus.
        kind: VirusKind,
        /// Route from the spawn node to the critical node.
        route: Vec<NodeId>,
    },
    /// Records that a scheduled spawn could not be issued.
    DiscardSpawn {
        /// Why the spawn was discarded.
        reason: RouteFailure,
    },
    /// Resets a tower's attack timer after it attacked.
    FireTower {
        /// Tower that attacked.
        tower: TowerId,
    },
    /// Applies damage to a virus.
    DamageVirus {
        /// Virus receiving the damage.
        virus: VirusId,
        /// Final damage after buffs and multipliers.
        amount: f32,
        /// Tower that dealt the damage.
        source: TowerId,
    },
    /// Applies or refreshes a slow effect on a virus.
    SlowVirus {
        /// Virus receiving the effect.
        virus: VirusId,
        /// Fractional speed penalty.
        amount: f32,
        /// Length of the effect.
        duration: Duration,
    },
    /// Starts a support relationship between two towers.
    LinkSupport {
        /// Support tower granting the buff.
        support: TowerId,
        /// Tower receiving the buff.
        target: TowerId,
    },
    /// Ends a support relationship between two towers.
    UnlinkSupport {
        /// Support tower granting the buff.
        support: TowerId,
        /// Tower receiving the buff.
        target: TowerId,
    },
    /// Marks a wave as cleared and grants its reward.
    CompleteWave {
        /// One-based wave number.
        wave: u32,
    },
    /// Ends the game in victory.
    DeclareVictory,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that a new network replaced the previous one.
    NetworkConfigured {
        /// Number of nodes in the network.
        nodes: usize,
        /// Number of spawn nodes in the network.
        spawn_nodes: usize,
    },
    /// Reports that a layout was malformed.
    NetworkRejected {
        /// Problem found in the layout.
        error: ConfigurationError,
    },
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Announces that the pause flag changed.
    PauseChanged {
        /// Current value of the pause flag.
        paused: bool,
    },
    /// Confirms that all entities were discarded.
    Restarted,
    /// Confirms that a tower was built.
    TowerBuilt {
        /// Identifier assigned to the tower.
        tower: TowerId,
        /// Node hosting the tower.
        node: NodeId,
        /// Archetype of the tower.
        kind: TowerKind,
        /// Money spent on the tower.
        cost: u32,
    },
    /// Reports that a build request was rejected.
    BuildRejected {
        /// Node targeted by the request.
        node: NodeId,
        /// Archetype requested.
        kind: TowerKind,
        /// Why the request failed.
        reason: BuildError,
    },
    /// Confirms that a tower was upgraded.
    TowerUpgraded {
        /// Tower that was upgraded.
        tower: TowerId,
        /// Archetype of the tower.
        kind: TowerKind,
        /// Level reached.
        level: u32,
        /// Money spent on the upgrade.
        cost: u32,
    },
    /// Reports that an upgrade request was rejected.
    UpgradeRejected {
        /// Tower targeted by the request.
        tower: TowerId,
        /// Why the request failed.
        reason: UpgradeError,
    },
    /// Confirms that a tower was sold.
    TowerSold {
        /// Tower that was sold.
        tower: TowerId,
        /// Node the tower occupied.
        node: NodeId,
        /// Archetype of the tower.
        kind: TowerKind,
        /// Money returned to the player.
        refund: u32,
    },
    /// Reports that a sale request was rejected.
    SellRejected {
        /// Tower targeted by the request.
        tower: TowerId,
        /// Why the request failed.
        reason: SellError,
    },
    /// Reports that a node's buildability flag flipped.
    BuildabilityChanged {
        /// Node whose flag changed.
        node: NodeId,
        /// New value of the flag.
        buildable: bool,
    },
    /// Announces a preparation countdown.
    PreparationStarted {
        /// Length of the countdown.
        duration: Duration,
    },
    /// Announces the start of a wave.
    WaveStarted {
        /// One-based wave number.
        wave: u32,
        /// Number of viruses the wave will spawn.
        virus_count: u32,
    },
    /// Confirms that a virus entered the network.
    VirusSpawned {
        /// Identifier assigned to the virus.
        virus: VirusId,
        /// Archetype of the virus.
        kind: VirusKind,
        /// Spawn node the virus starts from.
        node: NodeId,
    },
    /// Reports that a scheduled spawn was dropped.
    SpawnDiscarded {
        /// Why the spawn was dropped.
        reason: RouteFailure,
    },
    /// Reports that a tower attacked.
    TowerFired {
        /// Tower that attacked.
        tower: TowerId,
        /// Archetype of the tower.
        kind: TowerKind,
        /// Position of the tower.
        position: Vec2,
    },
    /// Reports damage dealt to a surviving or dying virus.
    VirusDamaged {
        /// Virus that was hit.
        virus: VirusId,
        /// Archetype of the virus.
        kind: VirusKind,
        /// Tower that dealt the damage.
        source: TowerId,
        /// Damage dealt.
        amount: f32,
        /// Health left after the hit.
        remaining: f32,
        /// Position of the virus.
        position: Vec2,
    },
    /// Reports that a slow effect was applied or refreshed.
    VirusSlowed {
        /// Virus that was slowed.
        virus: VirusId,
        /// Speed multiplier now in effect.
        multiplier: f32,
        /// Position of the virus.
        position: Vec2,
    },
    /// Reports that a virus was destroyed.
    VirusDied {
        /// Virus that died.
        virus: VirusId,
        /// Archetype of the virus.
        kind: VirusKind,
        /// Money granted for the kill.
        bounty: u32,
        /// Position where the virus died.
        position: Vec2,
    },
    /// Reports that a virus reached the critical node.
    VirusReachedCritical {
        /// Virus that reached the node.
        virus: VirusId,
        /// Archetype of the virus.
        kind: VirusKind,
        /// Health removed from the pool.
        damage: i32,
    },
    /// Reports that a virus exhausted its route away from the critical node.
    VirusStranded {
        /// Virus that was discarded.
        virus: VirusId,
    },
    /// Reports that a support relationship started.
    SupportLinked {
        /// Support tower granting the buff.
        support: TowerId,
        /// Tower receiving the buff.
        target: TowerId,
        /// Fraction granted to damage and attack speed.
        boost: f32,
    },
    /// Reports that a support relationship ended.
    SupportUnlinked {
        /// Support tower that granted the buff.
        support: TowerId,
        /// Tower that lost the buff.
        target: TowerId,
    },
    /// Reports the new money balance.
    MoneyChanged {
        /// Current balance.
        money: u32,
    },
    /// Reports the new health pool value.
    HealthChanged {
        /// Current health.
        health: i32,
    },
    /// Reports that a wave was cleared.
    WaveCompleted {
        /// One-based wave number.
        wave: u32,
        /// Money granted for clearing the wave.
        reward: u32,
    },
    /// The game ended in victory.
    GameWon,
    /// The game ended in defeat.
    GameLost,
}

/// Virus found within a tower's range during targeting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TowerTarget {
    /// Tower that can reach the virus.
    pub tower: TowerId,
    /// Virus within range.
    pub virus: VirusId,
    /// Euclidean distance between the tower and the virus.
    pub distance: f32,
}

/// Non-support tower found within a support tower's range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SupportLink {
    /// Support tower that can buff the target.
    pub support: TowerId,
    /// Tower within the support's range.
    pub target: TowerId,
}

/// Immutable representation of a single tower's state used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct TowerSnapshot {
    /// Identifier allocated to the tower.
    pub id: TowerId,
    /// Archetype of the tower.
    pub kind: TowerKind,
    /// Node hosting the tower.
    pub node: NodeId,
    /// Position of the tower.
    pub position: Vec2,
    /// Current upgrade level.
    pub level: u32,
    /// Stat tier for the current level.
    pub tier: TowerTier,
    /// Attack speed after support multipliers.
    pub attack_speed: f32,
    /// Accumulated damage buff fraction.
    pub damage_buff: f32,
    /// Accumulated attack speed buff fraction.
    pub speed_buff: f32,
    /// Time until the tower may attack again.
    pub ready_in: Duration,
    /// Towers currently buffed by this tower, sorted by id.
    pub supporting: Vec<TowerId>,
}

/// Read-only snapshot describing all towers placed within the network.
#[derive(Clone, Debug, Default)]
pub struct TowerView {
    snapshots: Vec<TowerSnapshot>,
}

impl TowerView {
    /// Creates a new tower view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<TowerSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured tower snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &TowerSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up the snapshot of a single tower.
    #[must_use]
    pub fn get(&self, tower: TowerId) -> Option<&TowerSnapshot> {
        self.snapshots
            .binary_search_by_key(&tower, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<TowerSnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a single virus's state used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct VirusSnapshot {
    /// Identifier allocated to the virus.
    pub id: VirusId,
    /// Archetype of the virus.
    pub kind: VirusKind,
    /// Current position of the virus.
    pub position: Vec2,
    /// Remaining health.
    pub health: f32,
    /// Whether a slow effect is currently running.
    pub slowed: bool,
}

/// Read-only snapshot describing all live viruses.
#[derive(Clone, Debug, Default)]
pub struct VirusView {
    snapshots: Vec<VirusSnapshot>,
}

impl VirusView {
    /// Creates a new virus view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<VirusSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured virus snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &VirusSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up the snapshot of a single virus.
    #[must_use]
    pub fn get(&self, virus: VirusId) -> Option<&VirusSnapshot> {
        self.snapshots
            .binary_search_by_key(&virus, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Number of captured snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
