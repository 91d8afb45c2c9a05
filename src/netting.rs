use serde::Serialize;
use std::collections::BTreeMap;

use crate::ledger::Debt;
use crate::money::Amount;
use crate::schemas::UserId;

/// Collapses two opposite directed debts into one.
///
/// Returns `(a_owes_b, b_owes_a)` where at most one side is non-zero.
pub fn net(owes_ab: Amount, owes_ba: Amount) -> (Amount, Amount) {
    let diff = owes_ab - owes_ba;
    if diff.is_positive() {
        (diff, Amount::ZERO)
    } else if diff.is_negative() {
        (Amount::ZERO, -diff)
    } else {
        (Amount::ZERO, Amount::ZERO)
    }
}

/// An unordered pair of users, stored in alphabetical order so that every
/// debt between the same two users lands on the same entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserPair<'a> {
    pub user1: &'a str,
    pub user2: &'a str,
}

impl<'a> UserPair<'a> {
    /// `None` when both sides are the same user. The flag tells whether `a`
    /// was placed first.
    pub fn new(a: &'a str, b: &'a str) -> Option<(Self, bool)> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Some((UserPair { user1: a, user2: b }, true)),
            std::cmp::Ordering::Greater => Some((UserPair { user1: b, user2: a }, false)),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Directed magnitudes accumulated for one [`UserPair`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PairDebts {
    pub one_owes_two: Amount,
    pub two_owes_one: Amount,
}

impl PairDebts {
    pub fn netted(self) -> PairDebts {
        let (one_owes_two, two_owes_one) = net(self.one_owes_two, self.two_owes_one);
        PairDebts {
            one_owes_two,
            two_owes_one,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NetDebt {
    pub from: UserId,
    pub to: UserId,
    pub amount: Amount,
}

/// Debts between arbitrary users, bucketed per unordered pair.
#[derive(Debug, Default)]
pub struct PairwiseLedger<'a> {
    pairs: BTreeMap<UserPair<'a>, PairDebts>,
}

impl<'a> PairwiseLedger<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a debt to its pair. A credit only lowers the same-direction
    /// magnitude, it never moves to the other side before netting.
    pub fn record(&mut self, debt: Debt<'a>) {
        let Some((pair, debtor_first)) = UserPair::new(debt.debtor, debt.creditor) else {
            return;
        };
        let entry = self.pairs.entry(pair).or_default();
        if debtor_first {
            entry.one_owes_two += debt.amount;
        } else {
            entry.two_owes_one += debt.amount;
        }
    }

    /// Signed net of what `a` owes `b`; negative when `b` owes `a`.
    pub fn net_between(&self, a: &str, b: &str) -> Amount {
        let Some((pair, a_first)) = UserPair::new(a, b) else {
            return Amount::ZERO;
        };
        let debts = self.pairs.get(&pair).copied().unwrap_or_default();
        let diff = debts.one_owes_two - debts.two_owes_one;
        if a_first {
            diff
        } else {
            -diff
        }
    }

    /// One directed debt per pair that does not cancel out, in pair order.
    pub fn simplify(&self) -> Vec<NetDebt> {
        self.pairs
            .iter()
            .filter_map(|(pair, debts)| {
                let netted = debts.netted();
                if netted.one_owes_two.is_positive() {
                    Some(NetDebt {
                        from: pair.user1.to_string(),
                        to: pair.user2.to_string(),
                        amount: netted.one_owes_two,
                    })
                } else if netted.two_owes_one.is_positive() {
                    Some(NetDebt {
                        from: pair.user2.to_string(),
                        to: pair.user1.to_string(),
                        amount: netted.two_owes_one,
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}
