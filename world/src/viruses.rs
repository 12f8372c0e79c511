//! Virus state and per-tick movement along precomputed routes.

use std::time::Duration;

use network_defence_core::{NodeId, Vec2, VirusId, VirusKind, VirusProfile, VirusSnapshot};

/// Lowest speed multiplier a slow effect may impose.
const MIN_SLOW_MULTIPLIER: f32 = 0.3;

/// Outcome of advancing a virus for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Progress {
    Moving,
    /// The virus stepped onto the critical node.
    Arrived,
    /// The route ended somewhere other than the critical node.
    Stranded,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Slow {
    multiplier: f32,
    remaining: Duration,
}

/// State of a virus stored inside the world.
#[derive(Clone, Debug)]
pub(crate) struct VirusState {
    pub(crate) kind: VirusKind,
    pub(crate) health: f32,
    pub(crate) bounty: u32,
    speed: f32,
    route: Vec<NodeId>,
    waypoints: Vec<Vec2>,
    /// Index of the node the virus is heading towards.
    next: usize,
    /// Distance already travelled along the current leg.
    travelled: f32,
    pub(crate) position: Vec2,
    slow: Option<Slow>,
}

impl VirusState {
    /// Creates a virus standing on the first node of `route`.
    ///
    /// `waypoints` holds the position of every route node in the same order.
    pub(crate) fn new(
        kind: VirusKind,
        profile: VirusProfile,
        route: Vec<NodeId>,
        waypoints: Vec<Vec2>,
    ) -> Self {
        let position = waypoints.first().copied().unwrap_or(Vec2::ZERO);
        Self {
            kind,
            health: profile.max_health,
            bounty: profile.bounty,
            speed: profile.speed,
            route,
            waypoints,
            next: 1,
            travelled: 0.0,
            position,
            slow: None,
        }
    }

    pub(crate) fn spawn_node(&self) -> Option<NodeId> {
        self.route.first().copied()
    }

    pub(crate) fn is_slowed(&self) -> bool {
        self.slow.is_some()
    }

    fn speed_multiplier(&self) -> f32 {
        self.slow.map_or(1.0, |slow| slow.multiplier)
    }

    /// Applies or refreshes a slow effect, returning the multiplier now in effect.
    ///
    /// Reapplication replaces the previous effect rather than stacking with it.
    pub(crate) fn apply_slow(&mut self, amount: f32, duration: Duration) -> f32 {
        let multiplier = (1.0 - amount).max(MIN_SLOW_MULTIPLIER);
        self.slow = Some(Slow {
            multiplier,
            remaining: duration,
        });
        multiplier
    }

    /// Moves the virus along its route, carrying leftover distance across legs.
    pub(crate) fn advance(&mut self, dt: Duration, critical: Option<NodeId>) -> Progress {
        let mut budget = self.speed * self.speed_multiplier() * dt.as_secs_f32();
        let progress = loop {
            let (Some(&from), Some(&to)) = (
                self.waypoints.get(self.next - 1),
                self.waypoints.get(self.next),
            ) else {
                break Progress::Stranded;
            };

            let length = from.distance(to);
            let remaining = length - self.travelled;
            if budget < remaining {
                self.travelled += budget;
                let t = (self.travelled / length).clamp(0.0, 1.0);
                self.position = from.lerp(to, smoothstep(t));
                break Progress::Moving;
            }

            budget -= remaining.max(0.0);
            self.travelled = 0.0;
            self.position = to;
            let reached = self.route.get(self.next).copied();
            self.next += 1;
            if reached.is_some() && reached == critical {
                break Progress::Arrived;
            }
        };

        if let Some(slow) = self.slow.as_mut() {
            slow.remaining = slow.remaining.saturating_sub(dt);
            if slow.remaining.is_zero() {
                self.slow = None;
            }
        }

        progress
    }

    pub(crate) fn snapshot(&self, id: VirusId) -> VirusSnapshot {
        VirusSnapshot {
            id,
            kind: self.kind,
            position: self.position,
            health: self.health,
            slowed: self.is_slowed(),
        }
    }
}

fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(speed: f32) -> VirusProfile {
        VirusProfile {
            max_health: 30.0,
            speed,
            bounty: 7,
        }
    }

    fn straight(hops: u32) -> (Vec<NodeId>, Vec<Vec2>) {
        let route = (0..=hops).map(NodeId::new).collect();
        let points = (0..=hops).map(|i| Vec2::new(i as f32, 0.0)).collect();
        (route, points)
    }

    #[test]
    fn travels_through_legs_and_arrives_at_critical() {
        let (route, points) = straight(3);
        let mut virus = VirusState::new(VirusKind::Normal, profile(2.0), route, points);
        let critical = Some(NodeId::new(3));

        assert_eq!(virus.advance(Duration::from_millis(500), critical), Progress::Moving);
        assert_eq!(virus.advance(Duration::from_millis(500), critical), Progress::Moving);
        assert_eq!(virus.position, Vec2::new(2.0, 0.0));
        assert_eq!(virus.advance(Duration::from_millis(600), critical), Progress::Arrived);
    }

    #[test]
    fn interpolates_with_smoothstep() {
        let (route, points) = straight(1);
        let mut virus = VirusState::new(VirusKind::Normal, profile(1.0), route, points);
        let _ = virus.advance(Duration::from_millis(250), None);
        assert!((virus.position.x - smoothstep(0.25)).abs() < 1e-5);
    }

    #[test]
    fn route_without_critical_node_strands_the_virus() {
        let (route, points) = straight(1);
        let mut virus = VirusState::new(VirusKind::Fast, profile(10.0), route, points);
        assert_eq!(virus.advance(Duration::from_secs(1), None), Progress::Stranded);
    }

    #[test]
    fn slow_refreshes_and_expires() {
        let (route, points) = straight(10);
        let mut virus = VirusState::new(VirusKind::Tank, profile(1.0), route, points);

        assert!((virus.apply_slow(0.45, Duration::from_secs(3)) - 0.55).abs() < 1e-6);
        assert!((virus.apply_slow(0.9, Duration::from_secs(3)) - MIN_SLOW_MULTIPLIER).abs() < 1e-6);
        let _ = virus.advance(Duration::from_secs(2), None);
        assert!(virus.is_slowed());
        let _ = virus.advance(Duration::from_secs(1), None);
        assert!(!virus.is_slowed());
    }

    #[test]
    fn slowed_viruses_cover_less_ground() {
        let (route, points) = straight(10);
        let mut slowed = VirusState::new(VirusKind::Normal, profile(1.0), route.clone(), points.clone());
        let mut free = VirusState::new(VirusKind::Normal, profile(1.0), route, points);
        let _ = slowed.apply_slow(0.5, Duration::from_secs(5));

        let _ = slowed.advance(Duration::from_secs(3), None);
        let _ = free.advance(Duration::from_secs(3), None);
        assert!(slowed.position.x < free.position.x);
    }
}
