use serde::Serialize;
use std::collections::BTreeMap;

use crate::ledger::{expense_debts, settlement_credit, Debt};
use crate::money::Amount;
use crate::schemas::{Expense, Settlement, UserId};

/// A counterparty and the absolute net amount between them and the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Counterparty {
    pub user_id: UserId,
    pub amount: Amount,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OweDetails {
    pub you_owe: Vec<Counterparty>,
    pub you_are_owed_by: Vec<Counterparty>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UserBalances {
    pub you_owe: Amount,
    pub you_are_owed: Amount,
    pub total_balance: Amount,
    pub owe_details: OweDetails,
}

// What a counterparty owes the user (`owed`) and what the user owes them
// (`owing`).
#[derive(Clone, Copy, Debug, Default)]
struct Exposure {
    owed: Amount,
    owing: Amount,
}

/// Balances of `user` from one-to-one expenses and settlements.
///
/// Group records and records not touching `user` are skipped, so the caller
/// may pass a superset. Counterparties that net to zero are dropped. Both
/// lists are sorted by descending amount; equal amounts keep ascending user
/// id order.
pub fn compute_user_balances(
    user: &str,
    expenses: &[Expense],
    settlements: &[Settlement],
) -> UserBalances {
    let mut you_owe = Amount::ZERO;
    let mut you_are_owed = Amount::ZERO;
    let mut by_user: BTreeMap<&str, Exposure> = BTreeMap::new();

    let debts = expenses
        .iter()
        .filter(|e| e.is_direct())
        .flat_map(expense_debts)
        .chain(
            settlements
                .iter()
                .filter(|s| s.is_direct())
                .map(settlement_credit),
        );

    for Debt {
        debtor,
        creditor,
        amount,
    } in debts
    {
        if debtor == creditor {
            continue;
        }
        if creditor == user {
            you_are_owed += amount;
            by_user.entry(debtor).or_default().owed += amount;
        } else if debtor == user {
            you_owe += amount;
            by_user.entry(creditor).or_default().owing += amount;
        }
    }

    let mut owe_details = OweDetails::default();
    for (user_id, exposure) in by_user {
        let net = exposure.owed - exposure.owing;
        if net.is_zero() {
            continue;
        }
        let entry = Counterparty {
            user_id: user_id.to_string(),
            amount: net.abs(),
        };
        if net.is_positive() {
            owe_details.you_are_owed_by.push(entry);
        } else {
            owe_details.you_owe.push(entry);
        }
    }
    // Stable sort: ties stay in user id order.
    owe_details.you_owe.sort_by(|a, b| b.amount.cmp(&a.amount));
    owe_details.you_are_owed_by.sort_by(|a, b| b.amount.cmp(&a.amount));

    tracing::trace!(user, %you_owe, %you_are_owed, "computed user balances");

    UserBalances {
        you_owe,
        you_are_owed,
        total_balance: you_are_owed - you_owe,
        owe_details,
    }
}

/// Signed balance of `user` within one group, without pairwise detail.
///
/// Positive means the group owes the user. Only records of `group_id` count.
pub fn compute_group_balance(
    user: &str,
    group_id: &str,
    expenses: &[Expense],
    settlements: &[Settlement],
) -> Amount {
    let in_group = |id: &Option<String>| id.as_deref() == Some(group_id);

    expenses
        .iter()
        .filter(|e| in_group(&e.group_id))
        .flat_map(expense_debts)
        .chain(
            settlements
                .iter()
                .filter(|s| in_group(&s.group_id))
                .map(settlement_credit),
        )
        .filter(|debt| !debt.is_self_debt())
        .fold(Amount::ZERO, |balance, debt| {
            if debt.creditor == user {
                balance + debt.amount
            } else if debt.debtor == user {
                balance - debt.amount
            } else {
                balance
            }
        })
}
