//! Level documents describing a network, its waves and their tunables.

use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use network_defence_core::{NetworkLayout, NodeRole, NodeSpec, Vec2, WaveConfig};
use network_defence_simulation::{Level, SimulationConfig};
use network_defence_system_pathfinding::PathfindingConfig;
use network_defence_system_wave_scheduler::SchedulerConfig;
use network_defence_world::WorldConfig;
use serde::Deserialize;

/// Level played when no file is supplied on the command line.
const DEMO_LEVEL: &str = r#"
[[nodes]]
key = 0
role = "critical"
position = [0.0, 0.0]

[[nodes]]
key = 1
role = "normal"
position = [3.0, 0.0]

[[nodes]]
key = 2
role = "normal"
position = [0.0, 3.0]

[[nodes]]
key = 3
role = "normal"
position = [-3.0, 0.0]

[[nodes]]
key = 4
role = "normal"
position = [0.0, -3.0]

[[nodes]]
key = 5
role = "normal"
position = [6.0, 1.5]

[[nodes]]
key = 6
role = "normal"
position = [-6.0, -1.5]

[[nodes]]
key = 7
role = "spawn"
position = [9.0, 0.0]

[[nodes]]
key = 8
role = "spawn"
position = [-9.0, 0.0]

[[edges]]
between = [0, 1]

[[edges]]
between = [0, 2]

[[edges]]
between = [0, 3]

[[edges]]
between = [0, 4]

[[edges]]
between = [1, 2]

[[edges]]
between = [2, 3]

[[edges]]
between = [3, 4]

[[edges]]
between = [4, 1]

[[edges]]
between = [1, 5]

[[edges]]
between = [2, 5]

[[edges]]
between = [3, 6]

[[edges]]
between = [4, 6]

[[edges]]
between = [5, 7]

[[edges]]
between = [6, 8]

[[waves]]
virus_count = 6
spawn_interval_secs = 1.2
normal_chance = 0.8
fast_chance = 0.2

[[waves]]
virus_count = 10
spawn_interval_secs = 1.0
normal_chance = 0.6
fast_chance = 0.3

[[waves]]
virus_count = 14
spawn_interval_secs = 0.9
normal_chance = 0.5
fast_chance = 0.3

[[waves]]
virus_count = 18
spawn_interval_secs = 0.8
normal_chance = 0.4
fast_chance = 0.35

[[waves]]
virus_count = 24
spawn_interval_secs = 0.7
normal_chance = 0.3
fast_chance = 0.4
"#;

/// Raw TOML document of a level.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LevelDocument {
    #[serde(default)]
    economy: WorldConfig,
    #[serde(default)]
    scheduler: SchedulerSection,
    #[serde(default)]
    pathfinding: PathfindingConfig,
    nodes: Vec<NodeEntry>,
    #[serde(default)]
    edges: Vec<EdgeEntry>,
    waves: Vec<WaveEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SchedulerSection {
    initial_preparation_secs: f64,
    between_waves_secs: f64,
    skip_remainder_secs: f64,
    first_wave_delay_secs: f64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            initial_preparation_secs: defaults.initial_preparation.as_secs_f64(),
            between_waves_secs: defaults.between_waves.as_secs_f64(),
            skip_remainder_secs: defaults.skip_remainder.as_secs_f64(),
            first_wave_delay_secs: defaults.first_wave_delay.as_secs_f64(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeEntry {
    key: u32,
    role: NodeRole,
    position: [f32; 2],
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EdgeEntry {
    between: [u32; 2],
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WaveEntry {
    virus_count: u32,
    spawn_interval_secs: f64,
    normal_chance: f32,
    fast_chance: f32,
}

/// Level together with the tunables it ships with.
#[derive(Clone, Debug)]
pub(crate) struct LoadedLevel {
    /// Network and waves.
    pub(crate) level: Level,
    /// Tunables of every service; the seed is left at zero.
    pub(crate) config: SimulationConfig,
}

/// Reads and parses the level stored at `path`.
pub(crate) fn load(path: &Path) -> Result<LoadedLevel> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read level file {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid level file {}", path.display()))
}

/// Built-in level used when no file is supplied.
pub(crate) fn demo() -> Result<LoadedLevel> {
    parse(DEMO_LEVEL).context("built-in demo level is malformed")
}

/// Parses a level from TOML contents.
pub(crate) fn parse(contents: &str) -> Result<LoadedLevel> {
    let document: LevelDocument =
        toml::from_str(contents).context("failed to parse level toml contents")?;

    let section = &document.scheduler;
    let scheduler = SchedulerConfig {
        initial_preparation: seconds(
            section.initial_preparation_secs,
            "initial_preparation_secs",
        )?,
        between_waves: seconds(section.between_waves_secs, "between_waves_secs")?,
        skip_remainder: seconds(section.skip_remainder_secs, "skip_remainder_secs")?,
        first_wave_delay: seconds(section.first_wave_delay_secs, "first_wave_delay_secs")?,
    };

    let waves = document
        .waves
        .iter()
        .enumerate()
        .map(|(index, wave)| {
            let interval = seconds(wave.spawn_interval_secs, "spawn_interval_secs")
                .with_context(|| format!("wave {}", index + 1))?;
            Ok(WaveConfig::new(
                wave.virus_count,
                interval,
                wave.normal_chance,
                wave.fast_chance,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let layout = NetworkLayout {
        nodes: document
            .nodes
            .iter()
            .map(|node| NodeSpec {
                key: node.key,
                role: node.role,
                position: Vec2::from(node.position),
            })
            .collect(),
        edges: document
            .edges
            .iter()
            .map(|edge| (edge.between[0], edge.between[1]))
            .collect(),
    };

    Ok(LoadedLevel {
        level: Level { layout, waves },
        config: SimulationConfig {
            world: document.economy,
            scheduler,
            pathfinding: document.pathfinding,
            seed: 0,
        },
    })
}

fn seconds(value: f64, field: &str) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        bail!("{field} must be a non-negative number of seconds, got {value}");
    }
    Ok(Duration::from_secs_f64(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_defence_core::TowerKind;

    #[test]
    fn demo_level_parses() {
        let loaded = demo().expect("demo level parses");
        assert_eq!(loaded.level.layout.nodes.len(), 9);
        assert_eq!(loaded.level.waves.len(), 5);
        assert_eq!(loaded.config.world, WorldConfig::default());
        assert_eq!(loaded.config.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let loaded = parse(
            r#"
            [economy]
            start_money = 400

            [scheduler]
            initial_preparation_secs = 5.0
            first_wave_delay_secs = 0.0

            [pathfinding]
            random_path_chance = 0.0

            [[nodes]]
            key = 0
            role = "critical"
            position = [0.0, 0.0]

            [[nodes]]
            key = 1
            role = "spawn"
            position = [2.0, 0.0]

            [[edges]]
            between = [0, 1]

            [[waves]]
            virus_count = 3
            spawn_interval_secs = 0.5
            normal_chance = 1.0
            fast_chance = 0.0
            "#,
        )
        .expect("valid level");

        assert_eq!(loaded.config.world.start_money, 400);
        assert_eq!(loaded.config.world.start_health, 30);
        assert_eq!(
            loaded.config.scheduler.initial_preparation,
            Duration::from_secs(5)
        );
        assert_eq!(loaded.config.scheduler.first_wave_delay, Duration::ZERO);
        assert_eq!(
            loaded.config.scheduler.between_waves,
            Duration::from_secs(30)
        );
        assert_eq!(loaded.config.pathfinding.random_path_chance, 0.0);
        assert_eq!(loaded.config.pathfinding.step_cap, 50);
        assert_eq!(loaded.level.layout.edges, vec![(0, 1)]);
        assert_eq!(
            loaded.level.waves[0],
            WaveConfig::new(3, Duration::from_millis(500), 1.0, 0.0)
        );
        assert!(TowerKind::Damage.build_cost() <= loaded.config.world.start_money);
    }

    #[test]
    fn negative_durations_are_refused() {
        let error = parse(
            r#"
            [scheduler]
            between_waves_secs = -1.0

            [[nodes]]
            key = 0
            role = "critical"
            position = [0.0, 0.0]

            [[waves]]
            virus_count = 1
            spawn_interval_secs = 1.0
            normal_chance = 1.0
            fast_chance = 0.0
            "#,
        )
        .expect_err("negative duration");
        assert!(format!("{error:#}").contains("between_waves_secs"));
    }

    #[test]
    fn unknown_roles_are_refused() {
        let result = parse(
            r#"
            [[nodes]]
            key = 0
            role = "fortress"
            position = [0.0, 0.0]

            [[waves]]
            virus_count = 1
            spawn_interval_secs = 1.0
            normal_chance = 1.0
            fast_chance = 0.0
            "#,
        );
        assert!(result.is_err());
    }
}
