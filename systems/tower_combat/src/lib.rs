#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that resolves tower attacks and support relationships from
//! targeting data.
//!
//! Attacks are expressed as `FireTower`, `DamageVirus` and `SlowVirus`
//! commands. Support towers never attack; instead their desired links are
//! diffed against the links the world currently holds and the difference is
//! emitted as `UnlinkSupport` commands followed by `LinkSupport` commands, so
//! a target never carries the same support twice.

use std::time::Duration;

use log::debug;
use network_defence_core::{
    Command, SupportLink, TowerId, TowerKind, TowerSnapshot, TowerTarget, TowerView, Vec2,
    VirusKind, VirusSnapshot, VirusView, WavePhase,
};

/// How long a slow effect lasts once applied or refreshed.
pub const SLOW_DURATION: Duration = Duration::from_secs(3);

/// Fraction of the slow amount that affects tank viruses.
pub const TANK_SLOW_FACTOR: f32 = 0.25;

/// Area damage multiplier against tank viruses.
pub const AOE_TANK_FACTOR: f32 = 0.5;

/// Area damage multiplier against viruses with a running slow effect.
pub const AOE_SLOWED_FACTOR: f32 = 1.8;

/// Tower combat system that queues attack and support commands for ready towers.
#[derive(Debug, Default)]
pub struct TowerCombat {
    scratch: Vec<Command>,
    unlinks: Vec<Command>,
    links: Vec<Command>,
    desired: Vec<TowerId>,
    splash: Vec<VirusSnapshot>,
}

impl TowerCombat {
    /// Creates a new tower combat system with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits commands for every tower whose attack timer elapsed and which
    /// has at least one target, then reconciles support links.
    ///
    /// `targets` must be grouped by tower and ordered nearest first within a
    /// group, and `links` sorted by support, as produced by the targeting
    /// system. Nothing happens during the preparation phase.
    pub fn handle(
        &mut self,
        phase: WavePhase,
        towers: &TowerView,
        viruses: &VirusView,
        targets: &[TowerTarget],
        links: &[SupportLink],
        out: &mut Vec<Command>,
    ) {
        if phase == WavePhase::Preparation {
            return;
        }

        self.scratch.clear();
        let mut rest = targets;
        while let Some(first) = rest.first() {
            let tower = first.tower;
            let split = rest
                .iter()
                .position(|target| target.tower != tower)
                .unwrap_or(rest.len());
            let (group, tail) = rest.split_at(split);
            rest = tail;

            if let Some(snapshot) = towers.get(tower) {
                if snapshot.ready_in.is_zero() {
                    self.attack(snapshot, group, viruses);
                }
            }
        }

        self.reconcile_support(towers, links);

        out.reserve(self.scratch.len() + self.unlinks.len() + self.links.len());
        out.append(&mut self.scratch);
        out.append(&mut self.unlinks);
        out.append(&mut self.links);
    }

    fn attack(&mut self, tower: &TowerSnapshot, group: &[TowerTarget], viruses: &VirusView) {
        let start = self.scratch.len();
        self.scratch.push(Command::FireTower { tower: tower.id });

        match tower.kind {
            TowerKind::Slow => self.attack_slow(tower, group, viruses),
            TowerKind::Damage => self.attack_nearest(tower, group, viruses),
            TowerKind::Aoe => self.attack_area(tower, group, viruses),
            TowerKind::Support => {}
        }

        if self.scratch.len() == start + 1 {
            // no live target survived the lookup
            self.scratch.truncate(start);
            return;
        }
        debug!(
            "{} fired at {} targets",
            tower.kind.name_for(tower.id),
            group.len()
        );
    }

    fn attack_slow(&mut self, tower: &TowerSnapshot, group: &[TowerTarget], viruses: &VirusView) {
        let damage = buffed_damage(tower);
        for target in group {
            let Some(virus) = viruses.get(target.virus) else {
                continue;
            };
            let amount = match virus.kind {
                VirusKind::Tank => tower.tier.slow_amount * TANK_SLOW_FACTOR,
                VirusKind::Normal | VirusKind::Fast => tower.tier.slow_amount,
            };
            self.scratch.push(Command::SlowVirus {
                virus: virus.id,
                amount,
                duration: SLOW_DURATION,
            });
            if damage > 0.0 {
                self.scratch.push(Command::DamageVirus {
                    virus: virus.id,
                    amount: damage,
                    source: tower.id,
                });
            }
        }
    }

    fn attack_nearest(
        &mut self,
        tower: &TowerSnapshot,
        group: &[TowerTarget],
        viruses: &VirusView,
    ) {
        let Some(virus) = group.iter().find_map(|target| viruses.get(target.virus)) else {
            return;
        };
        self.scratch.push(Command::DamageVirus {
            virus: virus.id,
            amount: buffed_damage(tower) * virus.kind.damage_multiplier(),
            source: tower.id,
        });
    }

    fn attack_area(&mut self, tower: &TowerSnapshot, group: &[TowerTarget], viruses: &VirusView) {
        self.splash.clear();
        let mut sum = Vec2::ZERO;
        for target in group {
            if let Some(virus) = viruses.get(target.virus) {
                sum += virus.position;
                self.splash.push(virus.clone());
            }
        }
        if self.splash.is_empty() {
            return;
        }
        let center = sum / self.splash.len() as f32;

        let damage = buffed_damage(tower);
        for virus in &self.splash {
            if virus.position.distance(center) > tower.tier.aoe_radius {
                continue;
            }
            let mut amount = damage;
            if virus.kind == VirusKind::Tank {
                amount *= AOE_TANK_FACTOR;
            }
            if virus.slowed {
                amount *= AOE_SLOWED_FACTOR;
            }
            self.scratch.push(Command::DamageVirus {
                virus: virus.id,
                amount,
                source: tower.id,
            });
        }
    }

    fn reconcile_support(&mut self, towers: &TowerView, links: &[SupportLink]) {
        self.unlinks.clear();
        self.links.clear();

        for support in towers.iter().filter(|tower| tower.kind == TowerKind::Support) {
            self.desired.clear();
            self.desired.extend(
                links
                    .iter()
                    .filter(|link| link.support == support.id)
                    .map(|link| link.target),
            );

            for &target in &support.supporting {
                if !self.desired.contains(&target) {
                    self.unlinks.push(Command::UnlinkSupport {
                        support: support.id,
                        target,
                    });
                }
            }
            for &target in &self.desired {
                if support.supporting.binary_search(&target).is_err() {
                    self.links.push(Command::LinkSupport {
                        support: support.id,
                        target,
                    });
                }
            }
        }
    }
}

fn buffed_damage(tower: &TowerSnapshot) -> f32 {
    tower.tier.damage * (1.0 + tower.damage_buff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_defence_core::{NodeId, VirusId};

    fn tower(id: u32, kind: TowerKind) -> TowerSnapshot {
        TowerSnapshot {
            id: TowerId::new(id),
            kind,
            node: NodeId::new(id),
            position: Vec2::ZERO,
            level: 1,
            tier: kind.tier(1),
            attack_speed: kind.tier(1).attack_speed,
            damage_buff: 0.0,
            speed_buff: 0.0,
            ready_in: Duration::ZERO,
            supporting: Vec::new(),
        }
    }

    fn virus(id: u32, kind: VirusKind, x: f32) -> VirusSnapshot {
        VirusSnapshot {
            id: VirusId::new(id),
            kind,
            position: Vec2::new(x, 0.0),
            health: 100.0,
            slowed: false,
        }
    }

    fn target(tower: u32, virus: u32, distance: f32) -> TowerTarget {
        TowerTarget {
            tower: TowerId::new(tower),
            virus: VirusId::new(virus),
            distance,
        }
    }

    fn resolve(
        phase: WavePhase,
        towers: Vec<TowerSnapshot>,
        viruses: Vec<VirusSnapshot>,
        targets: &[TowerTarget],
        links: &[SupportLink],
    ) -> Vec<Command> {
        let mut system = TowerCombat::new();
        let mut out = Vec::new();
        system.handle(
            phase,
            &TowerView::from_snapshots(towers),
            &VirusView::from_snapshots(viruses),
            targets,
            links,
            &mut out,
        );
        out
    }

    fn damage_dealt(commands: &[Command]) -> Vec<(VirusId, f32)> {
        commands
            .iter()
            .filter_map(|command| match command {
                Command::DamageVirus { virus, amount, .. } => Some((*virus, *amount)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn buffed_damage_tower_against_fast_virus() {
        let mut damage = tower(1, TowerKind::Damage);
        damage.damage_buff = 0.2;

        let out = resolve(
            WavePhase::SpawningWave,
            vec![damage],
            vec![virus(3, VirusKind::Fast, 1.0)],
            &[target(1, 3, 1.0)],
            &[],
        );

        assert_eq!(out[0], Command::FireTower { tower: TowerId::new(1) });
        let dealt = damage_dealt(&out);
        assert_eq!(dealt.len(), 1);
        assert!((dealt[0].1 - 21.6).abs() < 1e-4, "dealt {}", dealt[0].1);
    }

    #[test]
    fn damage_tower_hits_only_the_nearest() {
        let out = resolve(
            WavePhase::SpawningWave,
            vec![tower(1, TowerKind::Damage)],
            vec![
                virus(1, VirusKind::Tank, 3.0),
                virus(2, VirusKind::Normal, 1.0),
            ],
            &[target(1, 2, 1.0), target(1, 1, 3.0)],
            &[],
        );

        assert_eq!(damage_dealt(&out), vec![(VirusId::new(2), 15.0)]);
    }

    #[test]
    fn cooling_towers_hold_fire() {
        let mut damage = tower(1, TowerKind::Damage);
        damage.ready_in = Duration::from_millis(300);

        let out = resolve(
            WavePhase::SpawningWave,
            vec![damage],
            vec![virus(1, VirusKind::Normal, 1.0)],
            &[target(1, 1, 1.0)],
            &[],
        );

        assert!(out.is_empty());
    }

    #[test]
    fn preparation_phase_is_silent() {
        let out = resolve(
            WavePhase::Preparation,
            vec![tower(1, TowerKind::Damage)],
            vec![virus(1, VirusKind::Normal, 1.0)],
            &[target(1, 1, 1.0)],
            &[],
        );

        assert!(out.is_empty());
    }

    #[test]
    fn slow_tower_hits_every_target_with_quartered_tank_slow() {
        let out = resolve(
            WavePhase::SpawningWave,
            vec![tower(1, TowerKind::Slow)],
            vec![
                virus(1, VirusKind::Normal, 1.0),
                virus(2, VirusKind::Tank, 2.0),
            ],
            &[target(1, 1, 1.0), target(1, 2, 2.0)],
            &[],
        );

        let slows: Vec<(VirusId, f32)> = out
            .iter()
            .filter_map(|command| match command {
                Command::SlowVirus { virus, amount, duration } => {
                    assert_eq!(*duration, SLOW_DURATION);
                    Some((*virus, *amount))
                }
                _ => None,
            })
            .collect();
        assert_eq!(slows.len(), 2);
        assert!((slows[0].1 - 0.45).abs() < 1e-6);
        assert!((slows[1].1 - 0.1125).abs() < 1e-6);
        assert_eq!(damage_dealt(&out).len(), 2);
    }

    #[test]
    fn area_tower_splashes_around_the_centroid() {
        let mut slowed = virus(3, VirusKind::Normal, 2.0);
        slowed.slowed = true;

        let out = resolve(
            WavePhase::SpawningWave,
            vec![tower(1, TowerKind::Aoe)],
            vec![
                virus(1, VirusKind::Normal, 0.0),
                virus(2, VirusKind::Tank, 1.0),
                slowed,
                virus(4, VirusKind::Normal, 4.5),
            ],
            &[
                target(1, 1, 0.0),
                target(1, 2, 1.0),
                target(1, 3, 2.0),
                target(1, 4, 4.5),
            ],
            &[],
        );

        // centroid sits at x = 1.875 with a 1.8 radius
        let dealt = damage_dealt(&out);
        assert_eq!(dealt.len(), 2);
        assert_eq!(dealt[0], (VirusId::new(2), 7.5));
        assert_eq!(dealt[1].0, VirusId::new(3));
        assert!((dealt[1].1 - 27.0).abs() < 1e-4);
    }

    #[test]
    fn missing_viruses_do_not_trigger_a_shot() {
        let out = resolve(
            WavePhase::SpawningWave,
            vec![tower(1, TowerKind::Damage)],
            Vec::new(),
            &[target(1, 5, 1.0)],
            &[],
        );

        assert!(out.is_empty());
    }

    #[test]
    fn support_links_are_diffed_unlinks_first() {
        let mut support = tower(1, TowerKind::Support);
        support.supporting = vec![TowerId::new(2), TowerId::new(3)];

        let out = resolve(
            WavePhase::SpawningWave,
            vec![
                support,
                tower(2, TowerKind::Damage),
                tower(3, TowerKind::Slow),
                tower(4, TowerKind::Aoe),
            ],
            Vec::new(),
            &[],
            &[
                SupportLink {
                    support: TowerId::new(1),
                    target: TowerId::new(3),
                },
                SupportLink {
                    support: TowerId::new(1),
                    target: TowerId::new(4),
                },
            ],
        );

        assert_eq!(
            out,
            vec![
                Command::UnlinkSupport {
                    support: TowerId::new(1),
                    target: TowerId::new(2),
                },
                Command::LinkSupport {
                    support: TowerId::new(1),
                    target: TowerId::new(4),
                },
            ]
        );
    }
}
