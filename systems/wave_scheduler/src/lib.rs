#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Wave state machine that drives preparation countdowns and virus spawning.
//!
//! The scheduler reacts to world events. Timers only advance on
//! [`Event::TimeAdvanced`], so pausing the world freezes every countdown and
//! spawn cadence without discarding progress. A wave is complete once every
//! scheduled spawn was issued and each one was resolved by a death, an arrival
//! at the critical node, a stranding or a discarded spawn.

use std::time::Duration;

use log::{info, warn};
use network_defence_core::{
    Command, ConfigurationError, Event, NodeId, RouteFailure, Topology, WaveConfig,
};
use network_defence_system_pathfinding::Pathfinder;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Timing parameters of the wave cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Countdown before the first wave.
    pub initial_preparation: Duration,
    /// Countdown between consecutive waves.
    pub between_waves: Duration,
    /// Time left on the countdown after the player skips it.
    pub skip_remainder: Duration,
    /// Pause between the end of the opening countdown and the first spawn.
    pub first_wave_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_preparation: Duration::from_secs(45),
            between_waves: Duration::from_secs(30),
            skip_remainder: Duration::from_millis(100),
            first_wave_delay: Duration::from_secs(1),
        }
    }
}

/// Network the scheduler spawns into.
#[derive(Debug)]
pub struct SpawnSite<'a, T: ?Sized> {
    /// Adjacency and positions used for route planning.
    pub topology: &'a T,
    /// Candidate spawn nodes; one is picked uniformly per virus.
    pub spawns: &'a [NodeId],
    /// Destination of every route.
    pub critical: Option<NodeId>,
}

impl<T: ?Sized> Clone for SpawnSite<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for SpawnSite<'_, T> {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct WaveProgress {
    index: usize,
    issued: u32,
    resolved: u32,
    elapsed: Duration,
    next_due: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Preparation { remaining: Duration, initial: bool },
    Starting { remaining: Duration },
    Spawning(WaveProgress),
    Halted,
}

/// Pure system that emits wave lifecycle and spawn commands.
#[derive(Debug)]
pub struct WaveScheduler {
    config: SchedulerConfig,
    waves: Vec<WaveConfig>,
    state: State,
    started: usize,
    pathfinder: Pathfinder,
    spawn_rng: ChaCha8Rng,
    route_rng: ChaCha8Rng,
}

impl WaveScheduler {
    /// Creates a scheduler for the provided waves.
    ///
    /// Fails when no waves are configured or a wave violates its constraints.
    pub fn new(
        config: SchedulerConfig,
        waves: Vec<WaveConfig>,
        pathfinder: Pathfinder,
        spawn_rng: ChaCha8Rng,
        route_rng: ChaCha8Rng,
    ) -> Result<Self, ConfigurationError> {
        if waves.is_empty() {
            return Err(ConfigurationError::NoWaves);
        }
        for (index, wave) in waves.iter().enumerate() {
            wave.validate(index)?;
        }

        Ok(Self {
            config,
            waves,
            state: State::Idle,
            started: 0,
            pathfinder,
            spawn_rng,
            route_rng,
        })
    }

    /// Starts the opening preparation countdown from the first wave.
    pub fn start(&mut self, out: &mut Vec<Command>) {
        self.started = 0;
        self.begin_preparation(self.config.initial_preparation, true, out);
    }

    /// Shortens a running preparation countdown to the skip remainder.
    ///
    /// Returns `false` when no countdown is running.
    pub fn skip_preparation(&mut self) -> bool {
        match &mut self.state {
            State::Preparation { remaining, .. } => {
                *remaining = (*remaining).min(self.config.skip_remainder);
                true
            }
            _ => false,
        }
    }

    /// Time left before the next wave starts, if a countdown is running.
    #[must_use]
    pub fn preparation_remaining(&self) -> Option<Duration> {
        match self.state {
            State::Preparation { remaining, .. } | State::Starting { remaining } => Some(remaining),
            _ => None,
        }
    }

    /// One-based number of the most recently started wave.
    #[must_use]
    pub fn current_wave(&self) -> u32 {
        self.started as u32
    }

    /// Number of configured waves.
    #[must_use]
    pub fn total_waves(&self) -> usize {
        self.waves.len()
    }

    /// Viruses of the running wave that were scheduled but not yet resolved.
    #[must_use]
    pub fn pending(&self) -> u32 {
        match self.state {
            State::Spawning(progress) => self
                .waves
                .get(progress.index)
                .map_or(0, |wave| wave.virus_count.saturating_sub(progress.resolved)),
            _ => 0,
        }
    }

    /// Reports whether the game ended and the scheduler stopped.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.state == State::Halted
    }

    /// Consumes world events and emits the commands that follow from them.
    pub fn handle<T>(&mut self, events: &[Event], site: SpawnSite<'_, T>, out: &mut Vec<Command>)
    where
        T: Topology + ?Sized,
    {
        for event in events {
            match event {
                Event::GameLost | Event::GameWon => self.state = State::Halted,
                Event::Restarted => self.state = State::Idle,
                Event::VirusDied { .. }
                | Event::VirusReachedCritical { .. }
                | Event::VirusStranded { .. }
                | Event::SpawnDiscarded { .. } => {
                    if let State::Spawning(progress) = &mut self.state {
                        progress.resolved = progress.resolved.saturating_add(1);
                    }
                }
                Event::TimeAdvanced { dt } => self.advance(*dt, site, out),
                _ => {}
            }
        }

        self.complete_if_resolved(out);
    }

    fn advance<T>(&mut self, dt: Duration, site: SpawnSite<'_, T>, out: &mut Vec<Command>)
    where
        T: Topology + ?Sized,
    {
        match self.state {
            State::Preparation { remaining, initial } => {
                let remaining = remaining.saturating_sub(dt);
                if !remaining.is_zero() {
                    self.state = State::Preparation { remaining, initial };
                } else if initial && !self.config.first_wave_delay.is_zero() {
                    self.state = State::Starting {
                        remaining: self.config.first_wave_delay,
                    };
                } else {
                    self.begin_wave(site, out);
                }
            }
            State::Starting { remaining } => {
                let remaining = remaining.saturating_sub(dt);
                if remaining.is_zero() {
                    self.begin_wave(site, out);
                } else {
                    self.state = State::Starting { remaining };
                }
            }
            State::Spawning(mut progress) => {
                progress.elapsed = progress.elapsed.saturating_add(dt);
                self.state = State::Spawning(progress);
                self.spawn_due(site, out);
            }
            State::Idle | State::Halted => {}
        }
    }

    fn begin_preparation(&mut self, duration: Duration, initial: bool, out: &mut Vec<Command>) {
        self.state = State::Preparation {
            remaining: duration,
            initial,
        };
        out.push(Command::BeginPreparation { duration });
    }

    fn begin_wave<T>(&mut self, site: SpawnSite<'_, T>, out: &mut Vec<Command>)
    where
        T: Topology + ?Sized,
    {
        let index = self.started;
        let Some(wave) = self.waves.get(index) else {
            self.state = State::Idle;
            return;
        };

        self.started += 1;
        info!(
            "starting wave {} of {} with {} viruses",
            self.started,
            self.waves.len(),
            wave.virus_count
        );
        out.push(Command::BeginWave {
            wave: self.started as u32,
            virus_count: wave.virus_count,
        });
        self.state = State::Spawning(WaveProgress {
            index,
            issued: 0,
            resolved: 0,
            elapsed: Duration::ZERO,
            next_due: Duration::ZERO,
        });
        self.spawn_due(site, out);
    }

    /// Issues every spawn whose due time has passed, the first one immediately.
    fn spawn_due<T>(&mut self, site: SpawnSite<'_, T>, out: &mut Vec<Command>)
    where
        T: Topology + ?Sized,
    {
        let State::Spawning(mut progress) = self.state else {
            return;
        };
        let Some(wave) = self.waves.get(progress.index).cloned() else {
            return;
        };

        while progress.issued < wave.virus_count && progress.elapsed >= progress.next_due {
            out.push(self.spawn_command(&wave, site));
            progress.issued += 1;
            progress.next_due = progress.next_due.saturating_add(wave.spawn_interval);
        }

        self.state = State::Spawning(progress);
    }

    fn spawn_command<T>(&mut self, wave: &WaveConfig, site: SpawnSite<'_, T>) -> Command
    where
        T: Topology + ?Sized,
    {
        let kind = wave.sample_kind(self.spawn_rng.gen::<f32>());
        if site.spawns.is_empty() {
            warn!("no spawn node available, discarding {:?} spawn", kind);
            return Command::DiscardSpawn {
                reason: RouteFailure::NoSpawnNode,
            };
        }
        let spawn = site.spawns[self.spawn_rng.gen_range(0..site.spawns.len())];
        let Some(critical) = site.critical else {
            warn!("no critical node available, discarding {:?} spawn", kind);
            return Command::DiscardSpawn {
                reason: RouteFailure::NoCriticalNode,
            };
        };

        match self
            .pathfinder
            .compute_route(site.topology, spawn, critical, &mut self.route_rng)
        {
            Ok(route) => Command::SpawnVirus { kind, route },
            Err(reason) => {
                warn!("discarding {:?} spawn at {:?}: {}", kind, spawn, reason);
                Command::DiscardSpawn { reason }
            }
        }
    }

    fn complete_if_resolved(&mut self, out: &mut Vec<Command>) {
        let State::Spawning(progress) = self.state else {
            return;
        };
        let Some(wave) = self.waves.get(progress.index) else {
            return;
        };
        if progress.issued < wave.virus_count || progress.resolved < progress.issued {
            return;
        }

        let number = progress.index as u32 + 1;
        out.push(Command::CompleteWave { wave: number });

        if progress.index + 1 >= self.waves.len() {
            info!("final wave {} resolved", number);
            out.push(Command::DeclareVictory);
            self.state = State::Halted;
        } else {
            self.begin_preparation(self.config.between_waves, false, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use network_defence_core::{EntityId, Vec2, VirusId, VirusKind};
    use network_defence_system_pathfinding::PathfindingConfig;
    use rand::SeedableRng;

    /// Spawn(1) - 2 - Critical(3) on a straight line.
    struct Line {
        adjacency: BTreeMap<NodeId, Vec<NodeId>>,
    }

    impl Line {
        fn new() -> Self {
            let id = NodeId::new;
            let adjacency = BTreeMap::from([
                (id(1), vec![id(2)]),
                (id(2), vec![id(1), id(3)]),
                (id(3), vec![id(2)]),
            ]);
            Self { adjacency }
        }
    }

    impl Topology for Line {
        fn position(&self, node: NodeId) -> Option<Vec2> {
            self.adjacency
                .contains_key(&node)
                .then(|| Vec2::new(node.get() as f32, 0.0))
        }

        fn neighbors(&self, node: NodeId) -> &[NodeId] {
            self.adjacency.get(&node).map_or(&[], Vec::as_slice)
        }
    }

    const SPAWNS: [NodeId; 1] = [NodeId::new(1)];

    fn site(line: &Line) -> SpawnSite<'_, Line> {
        SpawnSite {
            topology: line,
            spawns: &SPAWNS,
            critical: Some(NodeId::new(3)),
        }
    }

    fn wave(count: u32) -> WaveConfig {
        WaveConfig::new(count, Duration::from_secs(1), 1.0, 0.0)
    }

    fn scheduler(waves: Vec<WaveConfig>) -> WaveScheduler {
        let config = SchedulerConfig {
            first_wave_delay: Duration::ZERO,
            ..SchedulerConfig::default()
        };
        WaveScheduler::new(
            config,
            waves,
            Pathfinder::new(PathfindingConfig::default()),
            ChaCha8Rng::seed_from_u64(1),
            ChaCha8Rng::seed_from_u64(2),
        )
        .expect("waves are valid")
    }

    fn tick(secs: f32) -> Event {
        Event::TimeAdvanced {
            dt: Duration::from_secs_f32(secs),
        }
    }

    fn died(id: u32) -> Event {
        Event::VirusDied {
            virus: VirusId::new(id),
            kind: VirusKind::Normal,
            bounty: 7,
            position: Vec2::ZERO,
        }
    }

    fn spawned(commands: &[Command]) -> usize {
        commands
            .iter()
            .filter(|command| matches!(command, Command::SpawnVirus { .. }))
            .count()
    }

    /// Runs the opening countdown to completion and returns the emitted commands.
    fn open(scheduler: &mut WaveScheduler, line: &Line) -> Vec<Command> {
        let mut out = Vec::new();
        scheduler.start(&mut out);
        assert!(scheduler.skip_preparation());
        scheduler.handle(&[tick(0.1)], site(line), &mut out);
        out
    }

    #[test]
    fn empty_wave_list_is_rejected() {
        let error = WaveScheduler::new(
            SchedulerConfig::default(),
            Vec::new(),
            Pathfinder::default(),
            ChaCha8Rng::seed_from_u64(0),
            ChaCha8Rng::seed_from_u64(0),
        )
        .unwrap_err();
        assert_eq!(error, ConfigurationError::NoWaves);
    }

    #[test]
    fn skip_leaves_a_short_remainder() {
        let mut scheduler = scheduler(vec![wave(1)]);
        let mut out = Vec::new();
        scheduler.start(&mut out);

        assert_eq!(
            out,
            vec![Command::BeginPreparation {
                duration: Duration::from_secs(45)
            }]
        );
        assert!(scheduler.skip_preparation());
        assert_eq!(
            scheduler.preparation_remaining(),
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn first_spawn_is_immediate_and_cadence_is_bounded() {
        let line = Line::new();
        let mut scheduler = scheduler(vec![wave(3)]);
        let out = open(&mut scheduler, &line);

        assert!(out.contains(&Command::BeginWave {
            wave: 1,
            virus_count: 3
        }));
        assert_eq!(spawned(&out), 1);

        let mut out = Vec::new();
        scheduler.handle(&[tick(0.5)], site(&line), &mut out);
        assert_eq!(spawned(&out), 0);
        scheduler.handle(&[tick(0.5)], site(&line), &mut out);
        assert_eq!(spawned(&out), 1);
        scheduler.handle(&[tick(5.0)], site(&line), &mut out);
        assert_eq!(spawned(&out), 2);
    }

    #[test]
    fn spawned_routes_run_from_spawn_to_critical() {
        let line = Line::new();
        let mut scheduler = scheduler(vec![wave(1)]);
        let out = open(&mut scheduler, &line);

        let route = out.iter().find_map(|command| match command {
            Command::SpawnVirus { route, .. } => Some(route.clone()),
            _ => None,
        });
        assert_eq!(
            route,
            Some(vec![NodeId::new(1), NodeId::new(2), NodeId::new(3)])
        );
    }

    #[test]
    fn wave_completes_only_after_every_virus_resolves() {
        let line = Line::new();
        let mut scheduler = scheduler(vec![wave(2), wave(1)]);
        let _ = open(&mut scheduler, &line);

        let mut out = Vec::new();
        scheduler.handle(&[tick(1.0), died(1)], site(&line), &mut out);
        assert!(!out.contains(&Command::CompleteWave { wave: 1 }));
        assert_eq!(scheduler.pending(), 1);

        out.clear();
        scheduler.handle(&[died(2)], site(&line), &mut out);
        assert_eq!(
            out,
            vec![
                Command::CompleteWave { wave: 1 },
                Command::BeginPreparation {
                    duration: Duration::from_secs(30)
                },
            ]
        );
    }

    #[test]
    fn last_wave_declares_victory() {
        let line = Line::new();
        let mut scheduler = scheduler(vec![wave(1)]);
        let _ = open(&mut scheduler, &line);

        let mut out = Vec::new();
        scheduler.handle(
            &[Event::SpawnDiscarded {
                reason: RouteFailure::NoSpawnNode,
            }],
            site(&line),
            &mut out,
        );
        assert_eq!(
            out,
            vec![Command::CompleteWave { wave: 1 }, Command::DeclareVictory]
        );
        assert!(scheduler.is_halted());
    }

    #[test]
    fn defeat_halts_spawning() {
        let line = Line::new();
        let mut scheduler = scheduler(vec![wave(5)]);
        let _ = open(&mut scheduler, &line);

        let mut out = Vec::new();
        scheduler.handle(&[Event::GameLost, tick(10.0)], site(&line), &mut out);
        assert!(out.is_empty());
        assert!(scheduler.is_halted());
    }

    #[test]
    fn missing_spawn_nodes_discard_the_spawn() {
        let line = Line::new();
        let mut scheduler = scheduler(vec![wave(1)]);
        let mut out = Vec::new();
        scheduler.start(&mut out);
        let _ = scheduler.skip_preparation();

        let empty = SpawnSite {
            topology: &line,
            spawns: &[],
            critical: Some(NodeId::new(3)),
        };
        scheduler.handle(&[tick(0.1)], empty, &mut out);
        assert!(out.contains(&Command::DiscardSpawn {
            reason: RouteFailure::NoSpawnNode
        }));
    }

    #[test]
    fn opening_delay_precedes_the_first_wave() {
        let line = Line::new();
        let mut scheduler = WaveScheduler::new(
            SchedulerConfig::default(),
            vec![wave(1)],
            Pathfinder::default(),
            ChaCha8Rng::seed_from_u64(3),
            ChaCha8Rng::seed_from_u64(4),
        )
        .expect("waves are valid");
        let out = open(&mut scheduler, &line);
        assert_eq!(spawned(&out), 0);
        assert_eq!(scheduler.preparation_remaining(), Some(Duration::from_secs(1)));

        let mut out = Vec::new();
        scheduler.handle(&[tick(1.0)], site(&line), &mut out);
        assert_eq!(spawned(&out), 1);
        assert_eq!(scheduler.current_wave(), 1);
    }

    #[test]
    fn paused_world_freezes_countdown() {
        let line = Line::new();
        let mut scheduler = scheduler(vec![wave(1)]);
        let mut out = Vec::new();
        scheduler.start(&mut out);
        scheduler.handle(&[Event::PauseChanged { paused: true }], site(&line), &mut out);
        assert_eq!(scheduler.preparation_remaining(), Some(Duration::from_secs(45)));
    }
}
