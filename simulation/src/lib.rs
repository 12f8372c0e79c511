#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Owned service objects wired into a single per-tick driver.
//!
//! [`Simulation`] owns the world and every system. Each call to
//! [`Simulation::step`] advances the world clock first, so virus movement and
//! slow decay finish before towers read positions. Combat commands follow,
//! then the wave scheduler consumes the tick's events so wave completion is
//! only evaluated after deaths and arrivals were counted. Events produced by
//! player intents between steps are buffered and delivered at the start of
//! the next step.

mod seed;

use std::{mem, time::Duration};

use log::{error, info};
use network_defence_core::{
    BuildError, Command, ConfigurationError, Event, NetworkLayout, NodeId, Outcome, SellError,
    SupportLink, TowerId, TowerKind, TowerTarget, UpgradeError, WaveConfig, WavePhase,
};
use network_defence_system_feedback::{BattleLog, Cue, Effect, Feedback};
use network_defence_system_pathfinding::{Pathfinder, PathfindingConfig};
use network_defence_system_tower_combat::TowerCombat;
use network_defence_system_tower_targeting::TowerTargeting;
use network_defence_system_wave_scheduler::{SchedulerConfig, SpawnSite, WaveScheduler};
use network_defence_world::{self as world, query, World, WorldConfig};

/// Network and waves of a single level.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Level {
    /// Nodes and adjacency produced by the level-setup collaborator.
    pub layout: NetworkLayout,
    /// Waves in the order they are played.
    pub waves: Vec<WaveConfig>,
}

/// Tunables of every owned service.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulationConfig {
    /// Economy and placement constants.
    pub world: WorldConfig,
    /// Wave cycle timing.
    pub scheduler: SchedulerConfig,
    /// Route randomisation.
    pub pathfinding: PathfindingConfig,
    /// Seed from which every random stream is derived.
    pub seed: u64,
}

/// Values the UI collaborator pulls every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hud {
    /// Money available to the player.
    pub money: u32,
    /// Health left in the critical node's pool.
    pub health: i32,
    /// One-based number of the most recently started wave; zero before the first.
    pub wave: u32,
    /// Number of configured waves.
    pub total_waves: usize,
    /// Current phase of the wave cycle.
    pub phase: WavePhase,
    /// Countdown until the next wave, when one is running.
    pub preparation_remaining: Option<Duration>,
    /// Viruses of the running wave that are not yet resolved.
    pub remaining_viruses: u32,
    /// Terminal state of the game.
    pub outcome: Outcome,
    /// Whether the simulation is paused.
    pub paused: bool,
}

/// Presentation output collected during a step.
#[derive(Clone, Debug, Default)]
pub struct Frame {
    /// Audio cues in the order they were triggered.
    pub cues: Vec<Cue>,
    /// Visual effects in the order they were triggered.
    pub effects: Vec<Effect>,
}

/// Network Defence simulation driving the world with its systems.
#[derive(Debug)]
pub struct Simulation {
    level: Level,
    config: SimulationConfig,
    world: World,
    scheduler: WaveScheduler,
    targeting: TowerTargeting,
    combat: TowerCombat,
    feedback: Feedback,
    unseen: Vec<Event>,
    targets: Vec<TowerTarget>,
    links: Vec<SupportLink>,
    commands: Vec<Command>,
}

impl Simulation {
    /// Configures the level and starts the opening preparation countdown.
    ///
    /// Fails when the layout is malformed, has no spawn node, or when the
    /// wave list is empty or invalid.
    pub fn new(level: Level, config: SimulationConfig) -> Result<Self, ConfigurationError> {
        let mut world = World::with_config(config.world.clone());
        let mut unseen = Vec::new();
        configure(&mut world, &level, &mut unseen)?;
        let scheduler = scheduler(&level, &config)?;

        let mut simulation = Self {
            level,
            config,
            world,
            scheduler,
            targeting: TowerTargeting::new(),
            combat: TowerCombat::new(),
            feedback: Feedback::new(),
            unseen,
            targets: Vec::new(),
            links: Vec::new(),
            commands: Vec::new(),
        };
        simulation.start();
        Ok(simulation)
    }

    fn start(&mut self) {
        let mut commands = Vec::new();
        self.scheduler.start(&mut commands);
        self.execute(commands);
    }

    fn execute(&mut self, commands: Vec<Command>) {
        for command in commands {
            world::apply(&mut self.world, command, &mut self.unseen);
        }
    }

    /// Advances the simulation by `dt`, filling `frame` with the presentation
    /// output of every event observed during the step.
    pub fn step(&mut self, dt: Duration, frame: &mut Frame) {
        frame.cues.clear();
        frame.effects.clear();

        let mut events = mem::take(&mut self.unseen);
        world::apply(&mut self.world, Command::Tick { dt }, &mut events);

        if !query::is_paused(&self.world) && !query::outcome(&self.world).is_terminal() {
            let towers = query::tower_view(&self.world);
            let viruses = query::virus_view(&self.world);
            let phase = query::phase(&self.world);
            self.targeting
                .handle(phase, &towers, &viruses, &mut self.targets, &mut self.links);
            self.commands.clear();
            self.combat.handle(
                phase,
                &towers,
                &viruses,
                &self.targets,
                &self.links,
                &mut self.commands,
            );
            for command in self.commands.drain(..) {
                world::apply(&mut self.world, command, &mut events);
            }
        }

        // Spawns and completions can resolve further wave slots in the same step.
        let mut seen = 0;
        loop {
            let graph = query::graph(&self.world);
            let site = SpawnSite {
                topology: graph,
                spawns: graph.spawn_nodes(),
                critical: graph.critical(),
            };
            self.scheduler
                .handle(&events[seen..], site, &mut self.commands);
            seen = events.len();
            if self.commands.is_empty() {
                break;
            }
            for command in self.commands.drain(..) {
                world::apply(&mut self.world, command, &mut events);
            }
        }

        self.feedback
            .handle(&events, &mut frame.cues, &mut frame.effects);
    }

    /// Requests a tower on the provided node.
    pub fn build(&mut self, node: NodeId, kind: TowerKind) -> Result<TowerId, BuildError> {
        let start = self.unseen.len();
        world::apply(
            &mut self.world,
            Command::BuildTower { node, kind },
            &mut self.unseen,
        );
        self.unseen[start..]
            .iter()
            .find_map(|event| match event {
                Event::TowerBuilt { tower, .. } => Some(Ok(*tower)),
                Event::BuildRejected { reason, .. } => Some(Err(*reason)),
                _ => None,
            })
            .unwrap_or(Err(BuildError::NodeMissing))
    }

    /// Requests an upgrade, returning the level reached.
    pub fn upgrade(&mut self, tower: TowerId) -> Result<u32, UpgradeError> {
        let start = self.unseen.len();
        world::apply(
            &mut self.world,
            Command::UpgradeTower { tower },
            &mut self.unseen,
        );
        self.unseen[start..]
            .iter()
            .find_map(|event| match event {
                Event::TowerUpgraded { level, .. } => Some(Ok(*level)),
                Event::UpgradeRejected { reason, .. } => Some(Err(*reason)),
                _ => None,
            })
            .unwrap_or(Err(UpgradeError::TowerMissing))
    }

    /// Sells a tower, returning the refund.
    pub fn sell(&mut self, tower: TowerId) -> Result<u32, SellError> {
        let start = self.unseen.len();
        world::apply(&mut self.world, Command::SellTower { tower }, &mut self.unseen);
        self.unseen[start..]
            .iter()
            .find_map(|event| match event {
                Event::TowerSold { refund, .. } => Some(Ok(*refund)),
                Event::SellRejected { reason, .. } => Some(Err(*reason)),
                _ => None,
            })
            .unwrap_or(Err(SellError::TowerMissing))
    }

    /// Shortens the running preparation countdown.
    ///
    /// Returns `false` when no countdown is running.
    pub fn skip_preparation(&mut self) -> bool {
        self.scheduler.skip_preparation()
    }

    /// Suspends or resumes every per-tick advancement.
    pub fn set_paused(&mut self, paused: bool) {
        world::apply(
            &mut self.world,
            Command::SetPaused { paused },
            &mut self.unseen,
        );
    }

    /// Discards every entity, reconfigures the level and restarts the wave
    /// cycle from the opening preparation with fresh random streams.
    pub fn restart(&mut self) -> Result<(), ConfigurationError> {
        let mut events = Vec::new();
        world::apply(&mut self.world, Command::Restart, &mut events);
        configure(&mut self.world, &self.level, &mut events)?;

        let mut cues = Vec::new();
        let mut effects = Vec::new();
        self.feedback.handle(&events, &mut cues, &mut effects);

        self.unseen.clear();
        self.scheduler = scheduler(&self.level, &self.config)?;
        self.targeting = TowerTargeting::new();
        self.combat = TowerCombat::new();
        info!("level restarted");
        self.start();
        Ok(())
    }

    /// Snapshot of the values displayed by the HUD.
    #[must_use]
    pub fn hud(&self) -> Hud {
        Hud {
            money: query::money(&self.world),
            health: query::health(&self.world),
            wave: self.scheduler.current_wave(),
            total_waves: self.scheduler.total_waves(),
            phase: query::phase(&self.world),
            preparation_remaining: self.scheduler.preparation_remaining(),
            remaining_viruses: self.scheduler.pending(),
            outcome: query::outcome(&self.world),
            paused: query::is_paused(&self.world),
        }
    }

    /// Read-only access to the world for queries such as build menus.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Narrated history of the game.
    #[must_use]
    pub fn battle_log(&self) -> &BattleLog {
        self.feedback.log()
    }

    /// Reports whether the game reached victory or defeat.
    #[must_use]
    pub fn is_over(&self) -> bool {
        query::outcome(&self.world).is_terminal()
    }
}

fn configure(
    world: &mut World,
    level: &Level,
    out_events: &mut Vec<Event>,
) -> Result<(), ConfigurationError> {
    let start = out_events.len();
    world::apply(
        world,
        Command::ConfigureNetwork {
            layout: level.layout.clone(),
        },
        out_events,
    );
    let rejected = out_events[start..].iter().find_map(|event| match event {
        Event::NetworkRejected { error } => Some(error.clone()),
        _ => None,
    });
    if let Some(error) = rejected {
        return Err(error);
    }
    if query::graph(world).spawn_nodes().is_empty() {
        error!("level has no spawn nodes");
        return Err(ConfigurationError::NoSpawnNodes);
    }
    Ok(())
}

fn scheduler(level: &Level, config: &SimulationConfig) -> Result<WaveScheduler, ConfigurationError> {
    WaveScheduler::new(
        config.scheduler,
        level.waves.clone(),
        Pathfinder::new(config.pathfinding),
        seed::stream(config.seed, seed::RNG_STREAM_SPAWNING),
        seed::stream(config.seed, seed::RNG_STREAM_PATHFINDING),
    )
    .map_err(|error| {
        error!("wave scheduler refused to start: {}", error);
        error
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_defence_core::{NodeRole, NodeSpec, Vec2};

    fn line(spawn: bool) -> NetworkLayout {
        let role = |key| match key {
            0 => NodeRole::Critical,
            3 if spawn => NodeRole::Spawn,
            _ => NodeRole::Normal,
        };
        NetworkLayout {
            nodes: (0..4)
                .map(|key| NodeSpec {
                    key,
                    role: role(key),
                    position: Vec2::new(key as f32, 0.0),
                })
                .collect(),
            edges: (0..3).map(|key| (key, key + 1)).collect(),
        }
    }

    fn level(spawn: bool) -> Level {
        Level {
            layout: line(spawn),
            waves: vec![WaveConfig::new(1, Duration::from_secs(1), 1.0, 0.0)],
        }
    }

    fn node(simulation: &Simulation, key: u32) -> NodeId {
        query::graph(simulation.world())
            .node_for_key(key)
            .expect("key exists")
    }

    #[test]
    fn layouts_without_spawn_nodes_are_refused() {
        let error = Simulation::new(level(false), SimulationConfig::default())
            .expect_err("no spawn node");
        assert_eq!(error, ConfigurationError::NoSpawnNodes);
    }

    #[test]
    fn empty_wave_lists_are_refused() {
        let level = Level {
            waves: Vec::new(),
            ..level(true)
        };
        let error = Simulation::new(level, SimulationConfig::default()).expect_err("no waves");
        assert_eq!(error, ConfigurationError::NoWaves);
    }

    #[test]
    fn opening_countdown_is_reported_before_the_first_step() {
        let simulation =
            Simulation::new(level(true), SimulationConfig::default()).expect("valid level");
        let hud = simulation.hud();

        assert_eq!(hud.phase, WavePhase::Preparation);
        assert_eq!(hud.preparation_remaining, Some(Duration::from_secs(45)));
        assert_eq!(hud.wave, 0);
        assert_eq!(hud.total_waves, 1);
        assert_eq!(hud.money, 180);
        assert_eq!(hud.health, 30);
        assert!(!hud.paused);
    }

    #[test]
    fn intents_return_the_world_verdict() {
        let mut simulation =
            Simulation::new(level(true), SimulationConfig::default()).expect("valid level");
        let first = node(&simulation, 1);

        let tower = simulation
            .build(first, TowerKind::Slow)
            .expect("affordable");
        assert_eq!(
            simulation.build(first, TowerKind::Damage),
            Err(BuildError::NotBuildable)
        );
        assert_eq!(simulation.upgrade(tower), Ok(2));
        // 60 + 40 spent, 70% back
        assert_eq!(simulation.sell(tower), Ok(70));
        assert_eq!(simulation.sell(tower), Err(SellError::TowerMissing));
        assert_eq!(simulation.hud().money, 150);
    }

    #[test]
    fn skip_shortens_the_opening_countdown() {
        let mut simulation =
            Simulation::new(level(true), SimulationConfig::default()).expect("valid level");
        assert!(simulation.skip_preparation());
        assert_eq!(
            simulation.hud().preparation_remaining,
            Some(Duration::from_millis(100))
        );
    }
}
