//! Hardcoded stat tables for tower and virus archetypes.

use serde::{Deserialize, Serialize};

use crate::{TowerKind, VirusKind};

/// Highest level a tower can be upgraded to.
pub const MAX_TOWER_LEVEL: u32 = 3;

/// Multiplier applied to the upgrade price after every purchased upgrade.
pub const UPGRADE_COST_GROWTH: f32 = 1.5;

/// Stat block describing a tower at a single upgrade level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TowerTier {
    /// Targeting radius measured in world units.
    pub range: f32,
    /// Attacks per second before support multipliers are applied.
    pub attack_speed: f32,
    /// Damage dealt per attack before buffs and archetype multipliers.
    pub damage: f32,
    /// Fractional speed penalty applied by slow towers.
    pub slow_amount: f32,
    /// Splash radius around the centroid used by area towers.
    pub aoe_radius: f32,
    /// Buff fraction granted per support level by support towers.
    pub support_boost: f32,
}

impl TowerTier {
    const fn new(range: f32, attack_speed: f32, damage: f32) -> Self {
        Self {
            range,
            attack_speed,
            damage,
            slow_amount: 0.0,
            aoe_radius: 0.0,
            support_boost: 0.0,
        }
    }

    const fn with_slow(mut self, slow_amount: f32) -> Self {
        self.slow_amount = slow_amount;
        self
    }

    const fn with_aoe(mut self, aoe_radius: f32) -> Self {
        self.aoe_radius = aoe_radius;
        self
    }

    const fn with_support(mut self, support_boost: f32) -> Self {
        self.support_boost = support_boost;
        self
    }
}

impl TowerKind {
    /// Price paid to construct a tower of this kind.
    #[must_use]
    pub const fn build_cost(self) -> u32 {
        match self {
            Self::Slow => 60,
            Self::Damage => 70,
            Self::Aoe => 95,
            Self::Support => 85,
        }
    }

    /// Price of the first upgrade; later upgrades grow by [`UPGRADE_COST_GROWTH`].
    #[must_use]
    pub const fn base_upgrade_cost(self) -> u32 {
        match self {
            Self::Slow => 40,
            Self::Damage => 100,
            Self::Aoe => 70,
            Self::Support => 100,
        }
    }

    /// Returns the stat tier for the provided level.
    ///
    /// Levels outside `1..=MAX_TOWER_LEVEL` are clamped into that range.
    #[must_use]
    pub const fn tier(self, level: u32) -> TowerTier {
        let level = if level < 1 {
            1
        } else if level > MAX_TOWER_LEVEL {
            MAX_TOWER_LEVEL
        } else {
            level
        };

        match (self, level) {
            (Self::Slow, 1) => TowerTier::new(3.0, 0.7, 5.0).with_slow(0.45),
            (Self::Slow, 2) => TowerTier::new(3.3, 0.7, 4.0).with_slow(0.45),
            (Self::Slow, _) => TowerTier::new(3.6, 0.8, 6.0).with_slow(0.55),
            (Self::Damage, 1) => TowerTier::new(3.5, 0.8, 15.0),
            (Self::Damage, 2) => TowerTier::new(4.0, 1.0, 19.0),
            (Self::Damage, _) => TowerTier::new(4.5, 1.1, 28.0),
            (Self::Aoe, 1) => TowerTier::new(4.8, 0.3, 15.0).with_aoe(1.8),
            (Self::Aoe, 2) => TowerTier::new(5.1, 0.5, 20.0).with_aoe(2.1),
            (Self::Aoe, _) => TowerTier::new(6.4, 0.7, 25.0).with_aoe(2.4),
            (Self::Support, 1) => TowerTier::new(4.5, 1.0, 0.0).with_support(0.12),
            (Self::Support, 2) => TowerTier::new(5.0, 1.0, 0.0).with_support(0.15),
            (Self::Support, _) => TowerTier::new(5.5, 1.0, 0.0).with_support(0.20),
        }
    }
}

/// Scales an upgrade price by [`UPGRADE_COST_GROWTH`], rounding half to even.
#[must_use]
pub fn next_upgrade_cost(current: u32) -> u32 {
    (current as f32 * UPGRADE_COST_GROWTH).round_ties_even() as u32
}

/// Derived per-wave stats of a freshly spawned virus.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VirusProfile {
    /// Hit points the virus spawns with.
    pub max_health: f32,
    /// Movement speed in world units per second.
    pub speed: f32,
    /// Money granted to the player when the virus is destroyed.
    pub bounty: u32,
}

impl VirusKind {
    /// Computes the stats of a virus spawned during the provided wave number.
    #[must_use]
    pub fn profile(self, wave: u32) -> VirusProfile {
        let health_multiplier = wave_health_multiplier(wave);
        let wave = wave as f32;
        match self {
            Self::Normal => VirusProfile {
                max_health: 30.0 * health_multiplier,
                speed: 2.0 * (1.0 + wave * 0.02),
                bounty: 7 + (wave * 0.5).round_ties_even() as u32,
            },
            Self::Fast => VirusProfile {
                max_health: 17.0 * health_multiplier,
                speed: 3.8 * (1.0 + wave * 0.01),
                bounty: 5 + (wave * 0.7).round_ties_even() as u32,
            },
            Self::Tank => VirusProfile {
                max_health: 120.0 * health_multiplier,
                speed: 0.9,
                bounty: 15 + (wave * 1.2).round_ties_even() as u32,
            },
        }
    }

    /// Multiplier applied by single-target damage towers against this kind.
    #[must_use]
    pub const fn damage_multiplier(self) -> f32 {
        match self {
            Self::Normal => 1.0,
            Self::Fast => 1.2,
            Self::Tank => 1.5,
        }
    }
}

fn wave_health_multiplier(wave: u32) -> f32 {
    let wave = wave as f32;
    if wave <= 1.0 {
        1.0
    } else if wave <= 3.0 {
        1.0 + (wave - 1.0) * 0.3
    } else if wave <= 6.0 {
        1.6 + (wave - 3.0) * 0.4
    } else {
        2.8 + (wave - 6.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_clamp_out_of_range_levels() {
        assert_eq!(TowerKind::Damage.tier(0), TowerKind::Damage.tier(1));
        assert_eq!(TowerKind::Damage.tier(9), TowerKind::Damage.tier(3));
    }

    #[test]
    fn upgrade_costs_grow_by_half_rounding_to_even() {
        assert_eq!(next_upgrade_cost(40), 60);
        assert_eq!(next_upgrade_cost(60), 90);
        assert_eq!(next_upgrade_cost(105), 158);
    }

    #[test]
    fn health_multiplier_follows_piecewise_curve() {
        assert!((wave_health_multiplier(1) - 1.0).abs() < 1e-6);
        assert!((wave_health_multiplier(3) - 1.6).abs() < 1e-6);
        assert!((wave_health_multiplier(6) - 2.8).abs() < 1e-6);
        assert!((wave_health_multiplier(8) - 4.8).abs() < 1e-6);
    }

    #[test]
    fn tank_speed_ignores_wave_number() {
        let early = VirusKind::Tank.profile(1);
        let late = VirusKind::Tank.profile(10);
        assert!((early.speed - late.speed).abs() < f32::EPSILON);
        assert!(late.max_health > early.max_health);
        assert_eq!(late.bounty, 27);
    }
}
