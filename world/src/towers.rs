//! Authoritative tower state management utilities.

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use network_defence_core::{
    next_upgrade_cost, NodeId, TowerId, TowerKind, TowerSnapshot, TowerTier, Vec2,
    MAX_TOWER_LEVEL,
};

/// State of a tower stored inside the world.
///
/// Buffs are never accumulated in place. Every grant received from a support
/// tower is stored under the support's identifier and the derived values are
/// recomputed from scratch, so removing a grant restores the exact bits that
/// were present before it was applied.
#[derive(Clone, Debug)]
pub(crate) struct TowerState {
    pub(crate) kind: TowerKind,
    pub(crate) node: NodeId,
    pub(crate) position: Vec2,
    pub(crate) level: u32,
    pub(crate) tier: TowerTier,
    pub(crate) upgrade_cost: u32,
    pub(crate) total_spent: u32,
    pub(crate) cooldown: Duration,
    grants: BTreeMap<TowerId, f32>,
    pub(crate) supporting: BTreeSet<TowerId>,
    damage_buff: f32,
    speed_buff: f32,
    attack_speed: f32,
}

impl TowerState {
    pub(crate) fn new(kind: TowerKind, node: NodeId, position: Vec2) -> Self {
        let tier = kind.tier(1);
        Self {
            kind,
            node,
            position,
            level: 1,
            tier,
            upgrade_cost: kind.base_upgrade_cost(),
            total_spent: kind.build_cost(),
            cooldown: Duration::ZERO,
            grants: BTreeMap::new(),
            supporting: BTreeSet::new(),
            damage_buff: 0.0,
            speed_buff: 0.0,
            attack_speed: tier.attack_speed,
        }
    }

    pub(crate) fn can_upgrade(&self) -> bool {
        self.level < MAX_TOWER_LEVEL
    }

    /// Moves the tower to the next tier after its upgrade price was paid.
    pub(crate) fn upgrade(&mut self) {
        self.total_spent = self.total_spent.saturating_add(self.upgrade_cost);
        self.level = (self.level + 1).min(MAX_TOWER_LEVEL);
        self.tier = self.kind.tier(self.level);
        self.upgrade_cost = next_upgrade_cost(self.upgrade_cost);
        self.recompute();
    }

    /// Fraction this tower grants to every tower it supports.
    pub(crate) fn support_grant(&self) -> f32 {
        self.tier.support_boost * self.level as f32
    }

    /// Records or overwrites the grant received from a support tower.
    pub(crate) fn receive(&mut self, support: TowerId, boost: f32) {
        let _ = self.grants.insert(support, boost);
        self.recompute();
    }

    /// Drops the grant received from a support tower, reporting whether one existed.
    pub(crate) fn revoke(&mut self, support: TowerId) -> bool {
        let removed = self.grants.remove(&support).is_some();
        if removed {
            self.recompute();
        }
        removed
    }

    pub(crate) fn supporters(&self) -> Vec<TowerId> {
        self.grants.keys().copied().collect()
    }

    fn recompute(&mut self) {
        let mut buff = 0.0_f32;
        let mut factor = 1.0_f32;
        for &grant in self.grants.values() {
            buff += grant;
            factor *= 1.0 + grant;
        }
        self.damage_buff = buff;
        self.speed_buff = buff;
        self.attack_speed = self.tier.attack_speed * factor;
    }

    #[cfg(test)]
    pub(crate) fn damage_buff(&self) -> f32 {
        self.damage_buff
    }

    #[cfg(test)]
    pub(crate) fn attack_speed(&self) -> f32 {
        self.attack_speed
    }

    pub(crate) fn cool_down(&mut self, dt: Duration) {
        self.cooldown = self.cooldown.saturating_sub(dt);
    }

    /// Restarts the attack timer from the buffed attack speed.
    pub(crate) fn fire(&mut self) {
        self.cooldown = if self.attack_speed > 0.0 {
            Duration::from_secs_f32(1.0 / self.attack_speed)
        } else {
            Duration::MAX
        };
    }

    /// Money returned when the tower is sold.
    pub(crate) fn sell_price(&self, refund_fraction: f32) -> u32 {
        // Absorbs representation error so 0.7 of 170 floors to 119, not 118.
        (self.total_spent as f32 * refund_fraction + 1e-3).floor() as u32
    }

    pub(crate) fn snapshot(&self, id: TowerId) -> TowerSnapshot {
        TowerSnapshot {
            id,
            kind: self.kind,
            node: self.node,
            position: self.position,
            level: self.level,
            tier: self.tier,
            attack_speed: self.attack_speed,
            damage_buff: self.damage_buff,
            speed_buff: self.speed_buff,
            ready_in: self.cooldown,
            supporting: self.supporting.iter().copied().collect(),
        }
    }
}
