#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that computes deterministic tower targets from world snapshots.

use network_defence_core::{
    SupportLink, TowerId, TowerKind, TowerTarget, TowerView, Vec2, VirusId, VirusView, WavePhase,
};

/// Tower targeting system that reuses scratch buffers to avoid repeated allocations.
#[derive(Debug, Default)]
pub struct TowerTargeting {
    tower_workspace: Vec<TowerWorkspace>,
    virus_workspace: Vec<VirusCandidate>,
}

impl TowerTargeting {
    /// Creates a new tower targeting system with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the in-range viruses of every attacking tower and the
    /// in-range non-support towers of every support tower.
    ///
    /// Both output buffers are cleared first. Targets are grouped by tower id
    /// and ordered nearest first, ties broken by virus id. Support links are
    /// sorted by support id, then target id. Nothing is produced during the
    /// preparation phase.
    pub fn handle(
        &mut self,
        phase: WavePhase,
        towers: &TowerView,
        viruses: &VirusView,
        targets: &mut Vec<TowerTarget>,
        links: &mut Vec<SupportLink>,
    ) {
        targets.clear();
        links.clear();

        if phase == WavePhase::Preparation {
            return;
        }

        self.prepare_tower_workspace(towers);
        if self.tower_workspace.is_empty() {
            return;
        }
        self.prepare_virus_workspace(viruses);

        for tower in &self.tower_workspace {
            if tower.kind == TowerKind::Support {
                collect_supported(tower, &self.tower_workspace, links);
                continue;
            }

            let start = targets.len();
            for candidate in &self.virus_workspace {
                let distance = tower.position.distance(candidate.position);
                if distance <= tower.range {
                    targets.push(TowerTarget {
                        tower: tower.id,
                        virus: candidate.id,
                        distance,
                    });
                }
            }
            targets[start..].sort_by(|left, right| {
                left.distance
                    .total_cmp(&right.distance)
                    .then(left.virus.cmp(&right.virus))
            });
        }
    }

    fn prepare_tower_workspace(&mut self, towers: &TowerView) {
        self.tower_workspace.clear();
        let (lower, _) = towers.iter().size_hint();
        self.tower_workspace.reserve(lower);

        for snapshot in towers.iter() {
            self.tower_workspace.push(TowerWorkspace {
                id: snapshot.id,
                kind: snapshot.kind,
                position: snapshot.position,
                range: snapshot.tier.range,
            });
        }
    }

    fn prepare_virus_workspace(&mut self, viruses: &VirusView) {
        self.virus_workspace.clear();
        self.virus_workspace.reserve(viruses.len());

        for snapshot in viruses.iter() {
            if snapshot.health <= 0.0 {
                continue;
            }
            self.virus_workspace.push(VirusCandidate {
                id: snapshot.id,
                position: snapshot.position,
            });
        }
    }
}

fn collect_supported(
    support: &TowerWorkspace,
    towers: &[TowerWorkspace],
    links: &mut Vec<SupportLink>,
) {
    for tower in towers {
        if tower.kind == TowerKind::Support {
            continue;
        }
        if support.position.distance(tower.position) <= support.range {
            links.push(SupportLink {
                support: support.id,
                target: tower.id,
            });
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct TowerWorkspace {
    id: TowerId,
    kind: TowerKind,
    position: Vec2,
    range: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct VirusCandidate {
    id: VirusId,
    position: Vec2,
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_defence_core::{NodeId, TowerSnapshot, VirusKind, VirusSnapshot};
    use std::time::Duration;

    fn tower(id: u32, kind: TowerKind, position: Vec2) -> TowerSnapshot {
        TowerSnapshot {
            id: TowerId::new(id),
            kind,
            node: NodeId::new(id),
            position,
            level: 1,
            tier: kind.tier(1),
            attack_speed: kind.tier(1).attack_speed,
            damage_buff: 0.0,
            speed_buff: 0.0,
            ready_in: Duration::ZERO,
            supporting: Vec::new(),
        }
    }

    fn virus(id: u32, position: Vec2) -> VirusSnapshot {
        VirusSnapshot {
            id: VirusId::new(id),
            kind: VirusKind::Normal,
            position,
            health: 30.0,
            slowed: false,
        }
    }

    fn run(
        phase: WavePhase,
        towers: Vec<TowerSnapshot>,
        viruses: Vec<VirusSnapshot>,
    ) -> (Vec<TowerTarget>, Vec<SupportLink>) {
        let mut system = TowerTargeting::new();
        let mut targets = Vec::new();
        let mut links = Vec::new();
        system.handle(
            phase,
            &TowerView::from_snapshots(towers),
            &VirusView::from_snapshots(viruses),
            &mut targets,
            &mut links,
        );
        (targets, links)
    }

    #[test]
    fn targets_are_sorted_nearest_first() {
        let (targets, _) = run(
            WavePhase::SpawningWave,
            vec![tower(1, TowerKind::Damage, Vec2::ZERO)],
            vec![
                virus(1, Vec2::new(3.0, 0.0)),
                virus(2, Vec2::new(1.0, 0.0)),
                virus(3, Vec2::new(9.0, 0.0)),
            ],
        );

        let order: Vec<VirusId> = targets.iter().map(|target| target.virus).collect();
        assert_eq!(order, vec![VirusId::new(2), VirusId::new(1)]);
        assert!((targets[0].distance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn equidistant_viruses_prefer_smaller_id() {
        let (targets, _) = run(
            WavePhase::SpawningWave,
            vec![tower(1, TowerKind::Damage, Vec2::ZERO)],
            vec![virus(7, Vec2::new(0.0, 2.0)), virus(4, Vec2::new(2.0, 0.0))],
        );

        assert_eq!(targets[0].virus, VirusId::new(4));
        assert_eq!(targets[1].virus, VirusId::new(7));
    }

    #[test]
    fn range_boundary_is_inclusive() {
        let range = TowerKind::Slow.tier(1).range;
        let (targets, _) = run(
            WavePhase::SpawningWave,
            vec![tower(1, TowerKind::Slow, Vec2::ZERO)],
            vec![virus(1, Vec2::new(range, 0.0)), virus(2, Vec2::new(range + 0.01, 0.0))],
        );

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].virus, VirusId::new(1));
    }

    #[test]
    fn supports_collect_nearby_attackers_only() {
        let (targets, links) = run(
            WavePhase::SpawningWave,
            vec![
                tower(1, TowerKind::Support, Vec2::ZERO),
                tower(2, TowerKind::Damage, Vec2::new(2.0, 0.0)),
                tower(3, TowerKind::Support, Vec2::new(0.0, 1.0)),
                tower(4, TowerKind::Aoe, Vec2::new(20.0, 0.0)),
            ],
            vec![virus(1, Vec2::new(0.5, 0.0))],
        );

        assert_eq!(
            links,
            vec![
                SupportLink {
                    support: TowerId::new(1),
                    target: TowerId::new(2),
                },
                SupportLink {
                    support: TowerId::new(3),
                    target: TowerId::new(2),
                },
            ]
        );
        assert!(targets
            .iter()
            .all(|target| target.tower == TowerId::new(2)));
    }

    #[test]
    fn preparation_clears_outputs() {
        let mut system = TowerTargeting::new();
        let towers = TowerView::from_snapshots(vec![tower(1, TowerKind::Damage, Vec2::ZERO)]);
        let viruses = VirusView::from_snapshots(vec![virus(1, Vec2::new(1.0, 0.0))]);
        let mut targets = vec![TowerTarget {
            tower: TowerId::new(9),
            virus: VirusId::new(9),
            distance: 0.0,
        }];
        let mut links = vec![SupportLink {
            support: TowerId::new(9),
            target: TowerId::new(8),
        }];

        system.handle(
            WavePhase::Preparation,
            &towers,
            &viruses,
            &mut targets,
            &mut links,
        );

        assert!(targets.is_empty());
        assert!(links.is_empty());
    }

    #[test]
    fn cleanup_phase_still_targets() {
        let (targets, _) = run(
            WavePhase::WaveCleanup,
            vec![tower(1, TowerKind::Damage, Vec2::ZERO)],
            vec![virus(1, Vec2::new(1.0, 0.0))],
        );
        assert_eq!(targets.len(), 1);
    }
}
