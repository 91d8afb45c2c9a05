use serde::Serialize;
use std::collections::HashMap;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{expense_debts, settlement_credit, Debt};
use crate::money::Amount;
use crate::netting::net;
use crate::schemas::{Expense, Group, Settlement, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Owes {
    pub to: UserId,
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OwedBy {
    pub from: UserId,
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemberBalance {
    pub user_id: UserId,
    pub total_balance: Amount,
    pub owes: Vec<Owes>,
    pub owed_by: Vec<OwedBy>,
}

/// One simplified edge of the group ledger: `payer` still has to pay
/// `receiver`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub payer: UserId,
    pub receiver: UserId,
    pub amount: Amount,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GroupLedger {
    /// In membership order.
    pub balances: Vec<MemberBalance>,
    /// In canonical pair order.
    pub exchanges: Vec<Exchange>,
}

impl GroupLedger {
    pub fn balance_of(&self, user_id: &str) -> Option<&MemberBalance> {
        self.balances.iter().find(|b| b.user_id == user_id)
    }
}

// Dense ledger over a fixed member index. `debts[a][b]` is what member `a`
// owes member `b`.
struct Matrix<'a> {
    ids: Vec<&'a str>,
    index: HashMap<&'a str, usize>,
    totals: Vec<Amount>,
    debts: Vec<Vec<Amount>>,
}

impl<'a> Matrix<'a> {
    fn new(members: &'a [UserId]) -> Self {
        let mut ids = Vec::with_capacity(members.len());
        let mut index = HashMap::with_capacity(members.len());
        for member in members {
            if !index.contains_key(member.as_str()) {
                index.insert(member.as_str(), ids.len());
                ids.push(member.as_str());
            }
        }
        let n = ids.len();
        Matrix {
            ids,
            index,
            totals: vec![Amount::ZERO; n],
            debts: vec![vec![Amount::ZERO; n]; n],
        }
    }

    fn positions(&self, debt: &Debt<'_>) -> Option<(usize, usize)> {
        let debtor = self.index.get(debt.debtor).copied();
        let creditor = self.index.get(debt.creditor).copied();
        match (debtor, creditor) {
            (Some(d), Some(c)) if d != c => Some((d, c)),
            (Some(_), Some(_)) => None,
            _ => {
                tracing::warn!(
                    debtor = debt.debtor,
                    creditor = debt.creditor,
                    "skipping record that references a non-member"
                );
                None
            }
        }
    }

    fn apply_split(&mut self, debt: Debt<'_>) {
        if let Some((debtor, payer)) = self.positions(&debt) {
            self.totals[payer] += debt.amount;
            self.totals[debtor] -= debt.amount;
            self.debts[debtor][payer] += debt.amount;
        }
    }

    // `credit.amount` is negative: the payer's total goes up, the
    // receiver's goes down and the payer's directed debt shrinks.
    fn apply_settlement(&mut self, credit: Debt<'_>) {
        if let Some((payer, receiver)) = self.positions(&credit) {
            self.totals[payer] -= credit.amount;
            self.totals[receiver] += credit.amount;
            self.debts[payer][receiver] += credit.amount;
        }
    }

    /// Nets every unordered pair exactly once, visiting pairs in id order.
    fn simplify(&mut self) -> Vec<Exchange> {
        let mut order: Vec<usize> = (0..self.ids.len()).collect();
        order.sort_by_key(|&i| self.ids[i]);

        let mut exchanges = Vec::new();
        for (pos, &a) in order.iter().enumerate() {
            for &b in &order[pos + 1..] {
                let (a_owes_b, b_owes_a) = net(self.debts[a][b], self.debts[b][a]);
                self.debts[a][b] = a_owes_b;
                self.debts[b][a] = b_owes_a;
                if a_owes_b.is_positive() {
                    exchanges.push(self.exchange(a, b, a_owes_b));
                } else if b_owes_a.is_positive() {
                    exchanges.push(self.exchange(b, a, b_owes_a));
                }
            }
        }
        exchanges
    }

    fn exchange(&self, payer: usize, receiver: usize, amount: Amount) -> Exchange {
        Exchange {
            payer: self.ids[payer].to_string(),
            receiver: self.ids[receiver].to_string(),
            amount,
        }
    }

    fn member_balance(&self, m: usize) -> MemberBalance {
        let n = self.ids.len();
        MemberBalance {
            user_id: self.ids[m].to_string(),
            total_balance: self.totals[m],
            owes: (0..n)
                .filter(|&other| other != m && self.debts[m][other].is_positive())
                .map(|other| Owes {
                    to: self.ids[other].to_string(),
                    amount: self.debts[m][other],
                })
                .collect(),
            owed_by: (0..n)
                .filter(|&other| other != m && self.debts[other][m].is_positive())
                .map(|other| OwedBy {
                    from: self.ids[other].to_string(),
                    amount: self.debts[other][m],
                })
                .collect(),
        }
    }
}

/// Builds the pairwise simplified ledger of a group.
///
/// Netting happens per pair only: a cycle across three or more members is
/// left as is when each pair carries debt in a single direction.
pub fn build_group_ledger(
    members: &[UserId],
    expenses: &[Expense],
    settlements: &[Settlement],
) -> GroupLedger {
    let mut matrix = Matrix::new(members);

    for expense in expenses {
        for debt in expense_debts(expense) {
            matrix.apply_split(debt);
        }
    }
    for settlement in settlements {
        matrix.apply_settlement(settlement_credit(settlement));
    }

    let exchanges = matrix.simplify();
    let balances = (0..matrix.ids.len())
        .map(|m| matrix.member_balance(m))
        .collect();

    GroupLedger {
        balances,
        exchanges,
    }
}

/// Fails with `NotFound` for a missing group and `Forbidden` when
/// `requester` is not one of its members.
pub fn authorize_member<'a>(group: Option<&'a Group>, requester: &str) -> LedgerResult<&'a Group> {
    let group = group.ok_or_else(|| LedgerError::not_found("group"))?;
    if !group.is_member(requester) {
        return Err(LedgerError::forbidden(format!(
            "{requester} is not a member of group {}",
            group.id
        )));
    }
    Ok(group)
}
