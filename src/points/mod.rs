//! Reward point balances per principal.

use std::collections::BTreeMap;

use crate::Principal;

/// Wide enough that accumulation never overflows in practice.
pub type Points = u128;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PointsStore {
    balances: BTreeMap<Principal, Points>,
}

impl PointsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the account at zero on first credit. Returns the new balance.
    pub fn credit(&mut self, who: &Principal, amount: Points) -> Points {
        let balance = self.balances.entry(who.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
        *balance
    }

    pub fn balance_of(&self, who: &Principal) -> Points {
        self.balances.get(who).copied().unwrap_or(0)
    }

    pub fn total(&self) -> Points {
        self.balances
            .values()
            .fold(0, |acc: Points, b| acc.saturating_add(*b))
    }

    pub fn accounts(&self) -> &BTreeMap<Principal, Points> {
        &self.balances
    }
}

impl From<BTreeMap<Principal, Points>> for PointsStore {
    fn from(balances: BTreeMap<Principal, Points>) -> Self {
        Self { balances }
    }
}
