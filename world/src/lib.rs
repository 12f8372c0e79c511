#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Network Defence.

mod economy;
mod graph;
mod registry;
mod towers;
mod viruses;

use std::time::Duration;

use log::{debug, error, info, warn};
use network_defence_core::{
    BuildError, Command, Event, NodeId, Outcome, RouteFailure, SellError, TowerId, TowerKind,
    UpgradeError, Vec2, VirusId, VirusKind, WavePhase,
};
use serde::{Deserialize, Serialize};

use economy::Ledger;
pub use graph::{NodeGraph, NodeState};
use registry::Table;
use towers::TowerState;
use viruses::{Progress, VirusState};

/// Economy and placement constants of a level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Money available when the level starts.
    pub start_money: u32,
    /// Health pool of the critical node.
    pub start_health: i32,
    /// Health removed when a virus reaches the critical node.
    pub damage_to_base: i32,
    /// Fixed part of the wave completion reward.
    pub wave_reward_base: u32,
    /// Reward added per wave number.
    pub wave_reward_step: u32,
    /// Fraction of the total spend returned when a tower is sold.
    pub refund_fraction: f32,
    /// Hop radius within which a build source must exist.
    pub max_build_distance: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            start_money: 180,
            start_health: 30,
            damage_to_base: 1,
            wave_reward_base: 30,
            wave_reward_step: 10,
            refund_fraction: 0.7,
            max_build_distance: 2,
        }
    }
}

impl WorldConfig {
    /// Money granted for clearing the provided wave.
    #[must_use]
    pub fn wave_reward(&self, wave: u32) -> u32 {
        self.wave_reward_base
            .saturating_add(wave.saturating_mul(self.wave_reward_step))
    }
}

/// Represents the authoritative Network Defence world state.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    graph: NodeGraph,
    towers: Table<TowerId, TowerState>,
    viruses: Table<VirusId, VirusState>,
    ledger: Ledger,
    phase: WavePhase,
    wave: u32,
    outcome: Outcome,
    paused: bool,
    tick_index: u64,
}

impl World {
    /// Creates an empty world using the default economy constants.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates an empty world using the provided economy constants.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            graph: NodeGraph::new(config.max_build_distance),
            towers: Table::new(),
            viruses: Table::new(),
            ledger: Ledger::new(config.start_money, config.start_health),
            phase: WavePhase::Preparation,
            wave: 0,
            outcome: Outcome::InProgress,
            paused: false,
            tick_index: 0,
            config,
        }
    }

    fn is_running(&self) -> bool {
        !self.paused && !self.outcome.is_terminal()
    }

    fn restart(&mut self, out_events: &mut Vec<Event>) {
        self.graph.reset();
        self.towers.reset();
        self.viruses.reset();
        self.ledger = Ledger::new(self.config.start_money, self.config.start_health);
        self.phase = WavePhase::Preparation;
        self.wave = 0;
        self.outcome = Outcome::InProgress;
        self.paused = false;
        self.tick_index = 0;

        out_events.push(Event::Restarted);
        out_events.push(Event::MoneyChanged {
            money: self.ledger.money(),
        });
        out_events.push(Event::HealthChanged {
            health: self.ledger.health(),
        });
    }

    fn advance(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        self.tick_index = self.tick_index.saturating_add(1);
        out_events.push(Event::TimeAdvanced { dt });

        if self.phase != WavePhase::Preparation {
            for id in self.towers.ids() {
                if let Some(tower) = self.towers.get_mut(id) {
                    tower.cool_down(dt);
                }
            }
        }

        let critical = self.graph.critical();
        for id in self.viruses.ids() {
            let Some(virus) = self.viruses.get_mut(id) else {
                continue;
            };

            match virus.advance(dt, critical) {
                Progress::Moving => {}
                Progress::Arrived => {
                    let Some(virus) = self.viruses.unregister(id) else {
                        continue;
                    };
                    self.virus_arrived(id, virus.kind, out_events);
                    if self.outcome.is_terminal() {
                        break;
                    }
                }
                Progress::Stranded => {
                    warn!(
                        "virus {:?} exhausted its route before reaching the critical node",
                        id
                    );
                    let _ = self.viruses.unregister(id);
                    out_events.push(Event::VirusStranded { virus: id });
                }
            }
        }
    }

    fn virus_arrived(&mut self, virus: VirusId, kind: VirusKind, out_events: &mut Vec<Event>) {
        let damage = self.config.damage_to_base;
        let health = self.ledger.damage(damage);
        debug!("{} reached the critical node", kind.name_for(virus));
        out_events.push(Event::VirusReachedCritical {
            virus,
            kind,
            damage,
        });
        out_events.push(Event::HealthChanged { health });

        if health <= 0 && self.outcome == Outcome::InProgress {
            info!("critical node destroyed during wave {}", self.wave);
            self.outcome = Outcome::Defeat;
            out_events.push(Event::GameLost);
        }
    }

    fn refresh_buildability(&mut self, center: NodeId, out_events: &mut Vec<Event>) {
        for (node, buildable) in self.graph.refresh_around(center) {
            out_events.push(Event::BuildabilityChanged { node, buildable });
        }
    }

    fn build(&mut self, node: NodeId, kind: TowerKind, out_events: &mut Vec<Event>) {
        let position = match self.check_build(node) {
            Ok(position) => position,
            Err(reason) => {
                debug!("rejected {:?} tower on {:?}: {}", kind, node, reason);
                out_events.push(Event::BuildRejected { node, kind, reason });
                return;
            }
        };

        let cost = kind.build_cost();
        let money = match self.ledger.try_spend(cost) {
            Ok(money) => money,
            Err(error) => {
                out_events.push(Event::BuildRejected {
                    node,
                    kind,
                    reason: BuildError::Funds(error),
                });
                return;
            }
        };

        let tower = self
            .towers
            .register(|id| kind.name_for(id), TowerState::new(kind, node, position));
        self.graph.occupy(node, tower);
        debug!("built {} on {:?}", kind.name_for(tower), node);

        out_events.push(Event::TowerBuilt {
            tower,
            node,
            kind,
            cost,
        });
        out_events.push(Event::MoneyChanged { money });
        self.refresh_buildability(node, out_events);
    }

    fn check_build(&self, node: NodeId) -> Result<Vec2, BuildError> {
        if self.outcome.is_terminal() {
            return Err(BuildError::GameOver);
        }
        let state = self.graph.node(node).ok_or(BuildError::NodeMissing)?;
        if !self.graph.is_buildable(node) {
            return Err(BuildError::NotBuildable);
        }
        Ok(state.position())
    }

    fn upgrade(&mut self, tower: TowerId, out_events: &mut Vec<Event>) {
        let cost = match self.check_upgrade(tower) {
            Ok(cost) => cost,
            Err(reason) => {
                out_events.push(Event::UpgradeRejected { tower, reason });
                return;
            }
        };

        let money = match self.ledger.try_spend(cost) {
            Ok(money) => money,
            Err(error) => {
                out_events.push(Event::UpgradeRejected {
                    tower,
                    reason: UpgradeError::Funds(error),
                });
                return;
            }
        };

        let Some(state) = self.towers.get_mut(tower) else {
            return;
        };
        state.upgrade();
        let kind = state.kind;
        let level = state.level;
        let grant = state.support_grant();
        let targets: Vec<TowerId> = state.supporting.iter().copied().collect();
        debug!("upgraded {} to level {}", kind.name_for(tower), level);

        out_events.push(Event::TowerUpgraded {
            tower,
            kind,
            level,
            cost,
        });
        out_events.push(Event::MoneyChanged { money });

        // The new grant overwrites the old one in a single step per target.
        for target in targets {
            if let Some(receiver) = self.towers.get_mut(target) {
                receiver.receive(tower, grant);
                out_events.push(Event::SupportLinked {
                    support: tower,
                    target,
                    boost: grant,
                });
            }
        }
    }

    fn check_upgrade(&self, tower: TowerId) -> Result<u32, UpgradeError> {
        if self.outcome.is_terminal() {
            return Err(UpgradeError::GameOver);
        }
        let state = self.towers.get(tower).ok_or(UpgradeError::TowerMissing)?;
        if !state.can_upgrade() {
            return Err(UpgradeError::MaxLevel);
        }
        Ok(state.upgrade_cost)
    }

    fn sell(&mut self, tower: TowerId, out_events: &mut Vec<Event>) {
        if self.outcome.is_terminal() {
            out_events.push(Event::SellRejected {
                tower,
                reason: SellError::GameOver,
            });
            return;
        }
        let Some(state) = self.towers.unregister(tower) else {
            out_events.push(Event::SellRejected {
                tower,
                reason: SellError::TowerMissing,
            });
            return;
        };

        for &target in &state.supporting {
            if let Some(receiver) = self.towers.get_mut(target) {
                let _ = receiver.revoke(tower);
            }
            out_events.push(Event::SupportUnlinked {
                support: tower,
                target,
            });
        }
        for support in state.supporters() {
            if let Some(granter) = self.towers.get_mut(support) {
                let _ = granter.supporting.remove(&tower);
            }
            out_events.push(Event::SupportUnlinked {
                support,
                target: tower,
            });
        }

        let refund = state.sell_price(self.config.refund_fraction);
        let money = self.ledger.add(refund);
        self.graph.vacate(state.node);
        debug!("sold {} for {}", state.kind.name_for(tower), refund);

        out_events.push(Event::TowerSold {
            tower,
            node: state.node,
            kind: state.kind,
            refund,
        });
        out_events.push(Event::MoneyChanged { money });
        self.refresh_buildability(state.node, out_events);
    }

    fn link_support(&mut self, support: TowerId, target: TowerId, out_events: &mut Vec<Event>) {
        if support == target {
            return;
        }
        let Some(granter) = self.towers.get(support) else {
            return;
        };
        if granter.kind != TowerKind::Support || granter.supporting.contains(&target) {
            return;
        }
        let grant = granter.support_grant();

        let Some(receiver) = self.towers.get_mut(target) else {
            return;
        };
        if receiver.kind == TowerKind::Support {
            return;
        }
        receiver.receive(support, grant);

        if let Some(granter) = self.towers.get_mut(support) {
            let _ = granter.supporting.insert(target);
        }
        out_events.push(Event::SupportLinked {
            support,
            target,
            boost: grant,
        });
    }

    fn unlink_support(&mut self, support: TowerId, target: TowerId, out_events: &mut Vec<Event>) {
        let revoked = self
            .towers
            .get_mut(target)
            .is_some_and(|receiver| receiver.revoke(support));
        let detached = self
            .towers
            .get_mut(support)
            .is_some_and(|granter| granter.supporting.remove(&target));

        if revoked || detached {
            out_events.push(Event::SupportUnlinked { support, target });
        }
    }

    fn spawn(&mut self, kind: VirusKind, route: Vec<NodeId>, out_events: &mut Vec<Event>) {
        let Some(&origin) = route.first() else {
            out_events.push(Event::SpawnDiscarded {
                reason: RouteFailure::NoSpawnNode,
            });
            return;
        };

        let mut waypoints = Vec::with_capacity(route.len());
        for &node in &route {
            match self.graph.node(node) {
                Some(state) => waypoints.push(state.position()),
                None => {
                    warn!("discarding {:?} spawn: route crosses unknown node {:?}", kind, node);
                    out_events.push(Event::SpawnDiscarded {
                        reason: RouteFailure::UnknownNode { node },
                    });
                    return;
                }
            }
        }

        let profile = kind.profile(self.wave.max(1));
        let state = VirusState::new(kind, profile, route, waypoints);
        let node = state.spawn_node().unwrap_or(origin);
        let virus = self.viruses.register(|id| kind.name_for(id), state);
        debug!("spawned {} at {:?}", kind.name_for(virus), node);
        out_events.push(Event::VirusSpawned { virus, kind, node });
    }

    fn damage_virus(
        &mut self,
        virus: VirusId,
        amount: f32,
        source: TowerId,
        out_events: &mut Vec<Event>,
    ) {
        let Some(state) = self.viruses.get_mut(virus) else {
            return;
        };
        state.health -= amount;
        let kind = state.kind;
        let position = state.position;
        let remaining = state.health;
        out_events.push(Event::VirusDamaged {
            virus,
            kind,
            source,
            amount,
            remaining,
            position,
        });

        if remaining > 0.0 {
            return;
        }
        let Some(state) = self.viruses.unregister(virus) else {
            return;
        };
        let money = self.ledger.add(state.bounty);
        out_events.push(Event::VirusDied {
            virus,
            kind,
            bounty: state.bounty,
            position,
        });
        out_events.push(Event::MoneyChanged { money });
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureNetwork { layout } => {
            world.towers.clear();
            world.viruses.clear();
            match world.graph.configure(&layout) {
                Ok(()) => {
                    info!(
                        "configured network with {} nodes and {} spawn nodes",
                        world.graph.len(),
                        world.graph.spawn_nodes().len()
                    );
                    out_events.push(Event::NetworkConfigured {
                        nodes: world.graph.len(),
                        spawn_nodes: world.graph.spawn_nodes().len(),
                    });
                    for node in world.graph.node_ids() {
                        if world.graph.is_buildable(node) {
                            out_events.push(Event::BuildabilityChanged {
                                node,
                                buildable: true,
                            });
                        }
                    }
                }
                Err(error) => {
                    error!("rejected network layout: {}", error);
                    out_events.push(Event::NetworkRejected { error });
                }
            }
        }
        Command::Tick { dt } => {
            if world.is_running() {
                world.advance(dt, out_events);
            }
        }
        Command::SetPaused { paused } => {
            if world.paused != paused {
                world.paused = paused;
                out_events.push(Event::PauseChanged { paused });
            }
        }
        Command::Restart => world.restart(out_events),
        Command::BuildTower { node, kind } => world.build(node, kind, out_events),
        Command::UpgradeTower { tower } => world.upgrade(tower, out_events),
        Command::SellTower { tower } => world.sell(tower, out_events),
        Command::BeginPreparation { duration } => {
            if world.outcome.is_terminal() {
                return;
            }
            world.phase = WavePhase::Preparation;
            out_events.push(Event::PreparationStarted { duration });
        }
        Command::BeginWave { wave, virus_count } => {
            if world.outcome.is_terminal() {
                return;
            }
            info!("wave {} started with {} viruses", wave, virus_count);
            world.phase = WavePhase::SpawningWave;
            world.wave = wave;
            out_events.push(Event::WaveStarted { wave, virus_count });
        }
        Command::SpawnVirus { kind, route } => {
            if !world.outcome.is_terminal() {
                world.spawn(kind, route, out_events);
            }
        }
        Command::DiscardSpawn { reason } => {
            warn!("scheduled spawn discarded: {}", reason);
            out_events.push(Event::SpawnDiscarded { reason });
        }
        Command::FireTower { tower } => {
            if let Some(state) = world.towers.get_mut(tower) {
                state.fire();
                out_events.push(Event::TowerFired {
                    tower,
                    kind: state.kind,
                    position: state.position,
                });
            }
        }
        Command::DamageVirus {
            virus,
            amount,
            source,
        } => world.damage_virus(virus, amount, source, out_events),
        Command::SlowVirus {
            virus,
            amount,
            duration,
        } => {
            if let Some(state) = world.viruses.get_mut(virus) {
                let multiplier = state.apply_slow(amount, duration);
                out_events.push(Event::VirusSlowed {
                    virus,
                    multiplier,
                    position: state.position,
                });
            }
        }
        Command::LinkSupport { support, target } => {
            world.link_support(support, target, out_events);
        }
        Command::UnlinkSupport { support, target } => {
            world.unlink_support(support, target, out_events);
        }
        Command::CompleteWave { wave } => {
            if world.outcome.is_terminal() {
                return;
            }
            let reward = world.config.wave_reward(wave);
            let money = world.ledger.add(reward);
            info!("wave {} cleared, reward {}", wave, reward);
            world.phase = WavePhase::WaveCleanup;
            out_events.push(Event::WaveCompleted { wave, reward });
            out_events.push(Event::MoneyChanged { money });
        }
        Command::DeclareVictory => {
            if world.outcome == Outcome::InProgress {
                info!("every wave cleared");
                world.outcome = Outcome::Victory;
                out_events.push(Event::GameWon);
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use network_defence_core::{
        NodeId, NodeRole, Outcome, TowerId, TowerKind, TowerView, VirusId, VirusView, WavePhase,
    };

    use super::{NodeGraph, World, WorldConfig};

    /// Current money balance.
    #[must_use]
    pub fn money(world: &World) -> u32 {
        world.ledger.money()
    }

    /// Current health of the critical node.
    #[must_use]
    pub fn health(world: &World) -> i32 {
        world.ledger.health()
    }

    /// Terminal state of the game, if reached.
    #[must_use]
    pub fn outcome(world: &World) -> Outcome {
        world.outcome
    }

    /// Current wave phase.
    #[must_use]
    pub fn phase(world: &World) -> WavePhase {
        world.phase
    }

    /// One-based number of the most recently started wave; zero before the first wave.
    #[must_use]
    pub fn wave(world: &World) -> u32 {
        world.wave
    }

    /// Reports whether per-tick advancement is suspended.
    #[must_use]
    pub fn is_paused(world: &World) -> bool {
        world.paused
    }

    /// Number of ticks that actually advanced the simulation.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Economy constants the world was created with.
    #[must_use]
    pub fn config(world: &World) -> &WorldConfig {
        &world.config
    }

    /// Provides read-only access to the node graph.
    #[must_use]
    pub fn graph(world: &World) -> &NodeGraph {
        &world.graph
    }

    /// Captures a read-only view of every placed tower.
    #[must_use]
    pub fn tower_view(world: &World) -> TowerView {
        TowerView::from_snapshots(
            world
                .towers
                .iter()
                .map(|(id, tower)| tower.snapshot(id))
                .collect(),
        )
    }

    /// Captures a read-only view of every live virus.
    #[must_use]
    pub fn virus_view(world: &World) -> VirusView {
        VirusView::from_snapshots(
            world
                .viruses
                .iter()
                .map(|(id, virus)| virus.snapshot(id))
                .collect(),
        )
    }

    /// Tower placed on the provided node, if any.
    #[must_use]
    pub fn tower_at(world: &World, node: NodeId) -> Option<TowerId> {
        world.graph.node(node).and_then(|state| state.occupant())
    }

    /// Diagnostic name of a live tower.
    #[must_use]
    pub fn tower_name(world: &World, tower: TowerId) -> Option<&str> {
        world.towers.name(tower)
    }

    /// Diagnostic name of a live virus.
    #[must_use]
    pub fn virus_name(world: &World, virus: VirusId) -> Option<&str> {
        world.viruses.name(virus)
    }

    /// Diagnostic name of a node.
    #[must_use]
    pub fn node_name(world: &World, node: NodeId) -> Option<&str> {
        world.graph.name(node)
    }

    /// Number of viruses currently in the network.
    #[must_use]
    pub fn live_virus_count(world: &World) -> usize {
        world.viruses.len()
    }

    /// Number of towers currently placed.
    #[must_use]
    pub fn tower_count(world: &World) -> usize {
        world.towers.len()
    }

    /// Price and affordability of building one tower kind.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BuildOption {
        /// Archetype offered by the menu.
        pub kind: TowerKind,
        /// Construction price.
        pub cost: u32,
        /// Whether the current balance covers the price.
        pub affordable: bool,
    }

    /// Upgrade and sale details of a placed tower.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TowerMenu {
        /// Tower the menu describes.
        pub tower: TowerId,
        /// Archetype of the tower.
        pub kind: TowerKind,
        /// Current upgrade level.
        pub level: u32,
        /// Price of the next upgrade, absent at maximum level.
        pub upgrade_cost: Option<u32>,
        /// Whether an upgrade request would currently succeed.
        pub can_upgrade: bool,
        /// Money returned if the tower is sold.
        pub sell_price: u32,
    }

    /// Menu contents for a selected node.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum BuildMenu {
        /// The node holds no tower.
        Empty {
            /// Role of the selected node.
            role: NodeRole,
            /// Whether any tower may be placed on the node.
            buildable: bool,
            /// Tower kinds in menu order.
            options: Vec<BuildOption>,
        },
        /// The node holds a tower.
        Occupied(TowerMenu),
    }

    /// Describes what the player may do with the selected node.
    ///
    /// Returns `None` when the node does not exist.
    #[must_use]
    pub fn build_menu(world: &World, node: NodeId) -> Option<BuildMenu> {
        let state = world.graph.node(node)?;
        let money = world.ledger.money();
        let running = !world.outcome.is_terminal();

        if let Some(tower) = state.occupant() {
            let tower_state = world.towers.get(tower)?;
            let upgrade_cost = tower_state
                .can_upgrade()
                .then_some(tower_state.upgrade_cost);
            return Some(BuildMenu::Occupied(TowerMenu {
                tower,
                kind: tower_state.kind,
                level: tower_state.level,
                upgrade_cost,
                can_upgrade: running && upgrade_cost.is_some_and(|cost| cost <= money),
                sell_price: tower_state.sell_price(world.config.refund_fraction),
            }));
        }

        let buildable = running && world.graph.is_buildable(node);
        let options = TowerKind::ALL
            .iter()
            .map(|&kind| BuildOption {
                kind,
                cost: kind.build_cost(),
                affordable: kind.build_cost() <= money,
            })
            .collect();
        Some(BuildMenu::Empty {
            role: state.role(),
            buildable,
            options,
        })
    }
}
