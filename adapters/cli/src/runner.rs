//! Headless game loop used by the `run` subcommand.

use std::{fmt, time::Duration};

use log::{debug, info};
use network_defence_core::{NodeId, Outcome, TowerKind};
use network_defence_simulation::{Frame, Simulation};
use network_defence_system_feedback::Cue;
use network_defence_world::query;

/// Tower kinds placed by the automatic builder, in rotation.
const BUILD_ROTATION: [TowerKind; 5] = [
    TowerKind::Damage,
    TowerKind::Slow,
    TowerKind::Damage,
    TowerKind::Aoe,
    TowerKind::Support,
];

/// Parameters of a headless run.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RunOptions {
    /// Upper bound on the number of simulated steps.
    pub(crate) max_ticks: u64,
    /// Simulated time per step.
    pub(crate) tick: Duration,
    /// Cut every preparation countdown short.
    pub(crate) skip_preparation: bool,
    /// Place towers near the critical node whenever affordable.
    pub(crate) auto_build: bool,
}

/// Result of a headless run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Summary {
    pub(crate) outcome: Outcome,
    pub(crate) wave: u32,
    pub(crate) total_waves: usize,
    pub(crate) money: u32,
    pub(crate) health: i32,
    pub(crate) ticks: u64,
    pub(crate) towers_built: u32,
    pub(crate) kills: u32,
    pub(crate) leaks: u32,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.outcome {
            Outcome::InProgress => "unfinished",
            Outcome::Victory => "victory",
            Outcome::Defeat => "defeat",
        };
        writeln!(f, "outcome: {outcome}")?;
        writeln!(f, "wave:    {}/{}", self.wave, self.total_waves)?;
        writeln!(f, "money:   {}", self.money)?;
        writeln!(f, "health:  {}", self.health)?;
        writeln!(f, "ticks:   {}", self.ticks)?;
        writeln!(f, "towers:  {}", self.towers_built)?;
        write!(f, "viruses: {} destroyed, {} leaked", self.kills, self.leaks)
    }
}

/// Steps the simulation until the game ends or the tick budget runs out.
pub(crate) fn run(simulation: &mut Simulation, options: RunOptions) -> Summary {
    let mut frame = Frame::default();
    let mut ticks = 0;
    let mut towers_built = 0;
    let mut kills = 0;
    let mut leaks = 0;

    while ticks < options.max_ticks && !simulation.is_over() {
        if options.auto_build && auto_build(simulation, towers_built) {
            towers_built += 1;
        }
        if options.skip_preparation {
            let _ = simulation.skip_preparation();
        }

        simulation.step(options.tick, &mut frame);
        ticks += 1;
        for cue in &frame.cues {
            match cue {
                Cue::VirusDeath => kills += 1,
                Cue::VirusReachedCritical => leaks += 1,
                _ => {}
            }
        }
    }

    let hud = simulation.hud();
    info!("run finished after {} ticks: {:?}", ticks, hud.outcome);
    Summary {
        outcome: hud.outcome,
        wave: hud.wave,
        total_waves: hud.total_waves,
        money: hud.money,
        health: hud.health,
        ticks,
        towers_built,
        kills,
        leaks,
    }
}

/// Builds the next tower of the rotation on the buildable node closest to the
/// critical node. Returns whether a tower was placed.
fn auto_build(simulation: &mut Simulation, built: u32) -> bool {
    let kind = BUILD_ROTATION[built as usize % BUILD_ROTATION.len()];
    if query::money(simulation.world()) < kind.build_cost() {
        return false;
    }
    let Some(node) = closest_buildable(simulation) else {
        return false;
    };

    match simulation.build(node, kind) {
        Ok(tower) => {
            debug!("auto-built {} on {:?}", kind.name_for(tower), node);
            true
        }
        Err(reason) => {
            debug!("auto-build of {:?} on {:?} refused: {}", kind, node, reason);
            false
        }
    }
}

fn closest_buildable(simulation: &Simulation) -> Option<NodeId> {
    let graph = query::graph(simulation.world());
    let critical = graph.critical()?;
    graph
        .node_ids()
        .into_iter()
        .filter(|&node| graph.is_buildable(node))
        .min_by_key(|&node| (graph.distance(node, critical).unwrap_or(u32::MAX), node))
}
