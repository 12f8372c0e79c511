//! Money and health bookkeeping.

use network_defence_core::ResourceError;

/// Player resources that are mutated only through explicit operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Ledger {
    money: u32,
    health: i32,
}

impl Ledger {
    pub(crate) fn new(money: u32, health: i32) -> Self {
        Self { money, health }
    }

    pub(crate) fn money(&self) -> u32 {
        self.money
    }

    pub(crate) fn health(&self) -> i32 {
        self.health
    }

    /// Credits the ledger, returning the new balance.
    pub(crate) fn add(&mut self, amount: u32) -> u32 {
        self.money = self.money.saturating_add(amount);
        self.money
    }

    /// Debits the ledger when the balance covers `amount`.
    ///
    /// A rejected spend leaves the balance untouched.
    pub(crate) fn try_spend(&mut self, amount: u32) -> Result<u32, ResourceError> {
        if self.money < amount {
            return Err(ResourceError::InsufficientFunds {
                required: amount,
                available: self.money,
            });
        }
        self.money -= amount;
        Ok(self.money)
    }

    /// Removes health from the pool, returning what is left.
    ///
    /// Health may go negative; callers treat any value at or below zero as defeat.
    pub(crate) fn damage(&mut self, amount: i32) -> i32 {
        self.health = self.health.saturating_sub(amount);
        self.health
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spend_is_atomic() {
        let mut ledger = Ledger::new(50, 30);
        assert_eq!(
            ledger.try_spend(70),
            Err(ResourceError::InsufficientFunds {
                required: 70,
                available: 50
            })
        );
        assert_eq!(ledger.money(), 50);
        assert_eq!(ledger.try_spend(50), Ok(0));
    }

    #[test]
    fn add_and_damage_report_new_values() {
        let mut ledger = Ledger::new(0, 2);
        assert_eq!(ledger.add(15), 15);
        assert_eq!(ledger.damage(1), 1);
        assert_eq!(ledger.damage(3), -2);
        assert_eq!(ledger.health(), -2);
    }
}
