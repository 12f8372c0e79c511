#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Translates world events into presentation feedback.
//!
//! The simulation never waits on its observers. This system turns each
//! batch of events into three one-way streams: named audio [`Cue`]s, visual
//! [`Effect`] notifications carrying positions and magnitudes, and narrated
//! lines appended to a bounded [`BattleLog`].

mod battle_log;

use std::collections::BTreeMap;

use network_defence_core::{
    node_name, BuildError, EntityId, Event, TowerId, TowerKind, UpgradeError, Vec2, VirusKind,
};

pub use battle_log::{BattleLog, LogCategory, LogEntry, DEFAULT_LOG_CAPACITY};

/// Named audio trigger for the audio collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cue {
    /// A tower was built.
    Build,
    /// A tower was sold.
    Sell,
    /// A tower was upgraded.
    Upgrade,
    /// A purchase was denied for lack of money.
    InsufficientFunds,
    /// A wave started.
    WaveStart,
    /// A wave was cleared.
    WaveComplete,
    /// The game was won.
    Victory,
    /// The game was lost.
    Defeat,
    /// A tower of the provided kind attacked.
    TowerShot(TowerKind),
    /// A support tower formed a link.
    SupportPulse,
    /// A virus entered the network.
    VirusSpawn,
    /// A virus took damage and survived.
    VirusDamaged,
    /// A virus was destroyed.
    VirusDeath,
    /// A virus reached the critical node.
    VirusReachedCritical,
}

/// Fire-and-forget notification for the rendering collaborator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Effect {
    /// A tower attacked from the provided position.
    Shot {
        /// Archetype of the tower.
        kind: TowerKind,
        /// Position of the tower.
        origin: Vec2,
    },
    /// A virus was hit.
    Hit {
        /// Position of the virus.
        position: Vec2,
        /// Damage dealt.
        amount: f32,
    },
    /// A virus was slowed.
    Slow {
        /// Position of the virus.
        position: Vec2,
        /// Speed multiplier now in effect.
        multiplier: f32,
    },
    /// A virus was destroyed.
    Death {
        /// Archetype of the virus.
        kind: VirusKind,
        /// Position where it died.
        position: Vec2,
    },
    /// A support link was formed.
    SupportLink {
        /// Support tower granting the buff.
        support: TowerId,
        /// Tower receiving the buff.
        target: TowerId,
        /// Fraction granted.
        boost: f32,
    },
}

/// Feedback system that keeps the battle log and the tower names it narrates.
#[derive(Debug, Default)]
pub struct Feedback {
    towers: BTreeMap<TowerId, TowerKind>,
    log: BattleLog,
}

impl Feedback {
    /// Creates a feedback system with an empty log of the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a feedback system whose log keeps at most `capacity` lines.
    #[must_use]
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            towers: BTreeMap::new(),
            log: BattleLog::with_capacity(capacity),
        }
    }

    /// Narrated history of the game so far.
    #[must_use]
    pub fn log(&self) -> &BattleLog {
        &self.log
    }

    /// Consumes a batch of world events, appending cues and effects and
    /// narrating noteworthy events into the battle log.
    pub fn handle(&mut self, events: &[Event], cues: &mut Vec<Cue>, effects: &mut Vec<Effect>) {
        for event in events {
            self.observe(event, cues, effects);
        }
    }

    fn tower_name(&self, tower: TowerId) -> String {
        match self.towers.get(&tower) {
            Some(kind) => kind.name_for(tower),
            None => format!("Tower_#{:03}", tower.get()),
        }
    }

    fn observe(&mut self, event: &Event, cues: &mut Vec<Cue>, effects: &mut Vec<Effect>) {
        match event {
            Event::Restarted => {
                self.towers.clear();
                self.log.clear();
                self.log.push(LogCategory::System, "Network restarted");
            }
            Event::NetworkRejected { error } => {
                self.log
                    .push(LogCategory::Warning, format!("Network rejected: {error}"));
            }
            Event::PauseChanged { paused } => {
                let text = if *paused { "Paused" } else { "Resumed" };
                self.log.push(LogCategory::System, text);
            }
            Event::TowerBuilt {
                tower,
                node,
                kind,
                cost,
            } => {
                let _ = self.towers.insert(*tower, *kind);
                cues.push(Cue::Build);
                self.log.push(
                    LogCategory::System,
                    format!(
                        "{} built on {} for {cost}",
                        kind.name_for(*tower),
                        node_name(*node)
                    ),
                );
            }
            Event::BuildRejected { node, kind, reason } => {
                let text = match reason {
                    BuildError::Funds(_) => {
                        cues.push(Cue::InsufficientFunds);
                        format!(
                            "Not enough money for a {} tower ({})",
                            kind.label(),
                            kind.build_cost()
                        )
                    }
                    other => format!("Cannot build on {}: {other}", node_name(*node)),
                };
                self.log.push(LogCategory::Warning, text);
            }
            Event::TowerUpgraded {
                tower, level, cost, ..
            } => {
                cues.push(Cue::Upgrade);
                let name = self.tower_name(*tower);
                self.log.push(
                    LogCategory::System,
                    format!("{name} upgraded to level {level} for {cost}"),
                );
            }
            Event::UpgradeRejected { tower, reason } => {
                if matches!(reason, UpgradeError::Funds(_)) {
                    cues.push(Cue::InsufficientFunds);
                }
                let name = self.tower_name(*tower);
                self.log
                    .push(LogCategory::Warning, format!("{name} cannot upgrade: {reason}"));
            }
            Event::TowerSold { tower, refund, .. } => {
                cues.push(Cue::Sell);
                let name = self.tower_name(*tower);
                self.log
                    .push(LogCategory::Money, format!("{name} sold for {refund}"));
                let _ = self.towers.remove(tower);
            }
            Event::PreparationStarted { duration } => {
                self.log.push(
                    LogCategory::System,
                    format!("Preparation: {:.0}s", duration.as_secs_f32()),
                );
            }
            Event::WaveStarted { wave, virus_count } => {
                cues.push(Cue::WaveStart);
                self.log.push(
                    LogCategory::System,
                    format!("Wave {wave} started: {virus_count} viruses"),
                );
            }
            Event::WaveCompleted { wave, reward } => {
                cues.push(Cue::WaveComplete);
                self.log.push(
                    LogCategory::Money,
                    format!("Wave {wave} cleared, reward {reward}"),
                );
            }
            Event::VirusSpawned { .. } => cues.push(Cue::VirusSpawn),
            Event::SpawnDiscarded { reason } => {
                self.log
                    .push(LogCategory::Warning, format!("Spawn skipped: {reason}"));
            }
            Event::TowerFired {
                kind, position, ..
            } => {
                cues.push(Cue::TowerShot(*kind));
                effects.push(Effect::Shot {
                    kind: *kind,
                    origin: *position,
                });
            }
            Event::VirusDamaged {
                virus,
                kind,
                source,
                amount,
                remaining,
                position,
            } => {
                if *remaining > 0.0 {
                    cues.push(Cue::VirusDamaged);
                }
                effects.push(Effect::Hit {
                    position: *position,
                    amount: *amount,
                });
                let name = self.tower_name(*source);
                self.log.push(
                    LogCategory::Damage,
                    format!("{name} -> {} ({amount:.1} damage)", kind.name_for(*virus)),
                );
            }
            Event::VirusSlowed {
                multiplier,
                position,
                ..
            } => {
                effects.push(Effect::Slow {
                    position: *position,
                    multiplier: *multiplier,
                });
            }
            Event::VirusDied {
                virus,
                kind,
                bounty,
                position,
            } => {
                cues.push(Cue::VirusDeath);
                effects.push(Effect::Death {
                    kind: *kind,
                    position: *position,
                });
                self.log.push(
                    LogCategory::Damage,
                    format!("{} destroyed", kind.name_for(*virus)),
                );
                self.log.push(LogCategory::Money, format!("+{bounty}"));
            }
            Event::VirusReachedCritical {
                virus,
                kind,
                damage,
            } => {
                cues.push(Cue::VirusReachedCritical);
                self.log.push(
                    LogCategory::Warning,
                    format!(
                        "{} reached the critical node (-{damage} health)",
                        kind.name_for(*virus)
                    ),
                );
            }
            Event::SupportLinked {
                support,
                target,
                boost,
            } => {
                cues.push(Cue::SupportPulse);
                effects.push(Effect::SupportLink {
                    support: *support,
                    target: *target,
                    boost: *boost,
                });
                let text = format!(
                    "{} boosts {} by {:.0}%",
                    self.tower_name(*support),
                    self.tower_name(*target),
                    boost * 100.0
                );
                self.log.push(LogCategory::Effect, text);
            }
            Event::GameWon => {
                cues.push(Cue::Victory);
                self.log.push(LogCategory::System, "Every wave repelled");
            }
            Event::GameLost => {
                cues.push(Cue::Defeat);
                self.log
                    .push(LogCategory::Warning, "The critical node has fallen");
            }
            Event::NetworkConfigured { .. }
            | Event::TimeAdvanced { .. }
            | Event::SellRejected { .. }
            | Event::BuildabilityChanged { .. }
            | Event::VirusStranded { .. }
            | Event::SupportUnlinked { .. }
            | Event::MoneyChanged { .. }
            | Event::HealthChanged { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_defence_core::{NodeId, ResourceError, VirusId};
    use std::time::Duration;

    fn run(feedback: &mut Feedback, events: &[Event]) -> (Vec<Cue>, Vec<Effect>) {
        let mut cues = Vec::new();
        let mut effects = Vec::new();
        feedback.handle(events, &mut cues, &mut effects);
        (cues, effects)
    }

    fn built(tower: u32, kind: TowerKind) -> Event {
        Event::TowerBuilt {
            tower: TowerId::new(tower),
            node: NodeId::new(tower + 10),
            kind,
            cost: kind.build_cost(),
        }
    }

    #[test]
    fn damage_is_narrated_with_entity_names() {
        let mut feedback = Feedback::new();
        let (_, effects) = run(
            &mut feedback,
            &[
                built(3, TowerKind::Damage),
                Event::VirusDamaged {
                    virus: VirusId::new(12),
                    kind: VirusKind::Fast,
                    source: TowerId::new(3),
                    amount: 21.6,
                    remaining: 1.4,
                    position: Vec2::new(1.0, 2.0),
                },
            ],
        );

        let latest = feedback.log().latest().expect("narrated");
        assert_eq!(latest.category, LogCategory::Damage);
        assert_eq!(latest.text, "Tower_Damage_#003 -> Virus_Fast_#012 (21.6 damage)");
        assert_eq!(
            effects,
            vec![Effect::Hit {
                position: Vec2::new(1.0, 2.0),
                amount: 21.6,
            }]
        );
    }

    #[test]
    fn denied_purchases_fire_the_funds_cue() {
        let mut feedback = Feedback::new();
        let funds = ResourceError::InsufficientFunds {
            required: 70,
            available: 50,
        };
        let (cues, _) = run(
            &mut feedback,
            &[
                Event::BuildRejected {
                    node: NodeId::new(2),
                    kind: TowerKind::Damage,
                    reason: BuildError::Funds(funds),
                },
                Event::UpgradeRejected {
                    tower: TowerId::new(1),
                    reason: UpgradeError::MaxLevel,
                },
            ],
        );

        assert_eq!(cues, vec![Cue::InsufficientFunds]);
        let categories: Vec<LogCategory> = feedback.log().iter().map(|entry| entry.category).collect();
        assert_eq!(categories, vec![LogCategory::Warning, LogCategory::Warning]);
    }

    #[test]
    fn deaths_produce_cue_effect_and_income_line() {
        let mut feedback = Feedback::new();
        let (cues, effects) = run(
            &mut feedback,
            &[Event::VirusDied {
                virus: VirusId::new(1),
                kind: VirusKind::Tank,
                bounty: 16,
                position: Vec2::ZERO,
            }],
        );

        assert_eq!(cues, vec![Cue::VirusDeath]);
        assert!(matches!(effects[0], Effect::Death { kind: VirusKind::Tank, .. }));
        let latest = feedback.log().latest().expect("narrated");
        assert_eq!(latest.category, LogCategory::Money);
        assert_eq!(latest.text, "+16");
    }

    #[test]
    fn restart_forgets_names_and_history() {
        let mut feedback = Feedback::new();
        let _ = run(
            &mut feedback,
            &[
                built(1, TowerKind::Slow),
                Event::PreparationStarted {
                    duration: Duration::from_secs(45),
                },
                Event::Restarted,
                Event::TowerSold {
                    tower: TowerId::new(1),
                    node: NodeId::new(11),
                    kind: TowerKind::Slow,
                    refund: 42,
                },
            ],
        );

        let texts: Vec<&str> = feedback.log().iter().map(|entry| entry.text.as_str()).collect();
        assert_eq!(texts, vec!["Network restarted", "Tower_#001 sold for 42"]);
    }

    #[test]
    fn shots_are_forwarded_per_archetype() {
        let mut feedback = Feedback::new();
        let (cues, effects) = run(
            &mut feedback,
            &[Event::TowerFired {
                tower: TowerId::new(4),
                kind: TowerKind::Aoe,
                position: Vec2::new(3.0, 3.0),
            }],
        );

        assert_eq!(cues, vec![Cue::TowerShot(TowerKind::Aoe)]);
        assert_eq!(
            effects,
            vec![Effect::Shot {
                kind: TowerKind::Aoe,
                origin: Vec2::new(3.0, 3.0),
            }]
        );
        assert!(feedback.log().is_empty());
    }
}
