//! Record builders shared by the unit tests.
use chrono::{DateTime, TimeZone, Utc};

use crate::money::Amount;
use crate::schemas::{Expense, Group, Membership, Role, Settlement, Split};

pub fn cents(value: i64) -> Amount {
    Amount::from_cents(value)
}

pub fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

/// A one-to-one expense; the total is the sum of the splits.
pub fn expense(id: &str, payer: &str, splits: &[(&str, i64, bool)]) -> Expense {
    let splits: Vec<Split> = splits
        .iter()
        .map(|&(user, amount, paid)| Split {
            user_id: user.to_string(),
            amount: cents(amount),
            paid,
        })
        .collect();
    Expense {
        id: id.to_string(),
        group_id: None,
        paid_by_user_id: payer.to_string(),
        date: day(2025, 3, 1),
        amount: splits.iter().map(|s| s.amount).sum(),
        description: format!("expense {id}"),
        splits,
    }
}

pub fn group_expense(id: &str, group: &str, payer: &str, splits: &[(&str, i64, bool)]) -> Expense {
    Expense {
        group_id: Some(group.to_string()),
        ..expense(id, payer, splits)
    }
}

pub fn settlement(id: &str, payer: &str, receiver: &str, amount: i64) -> Settlement {
    Settlement {
        id: id.to_string(),
        group_id: None,
        paid_by_user_id: payer.to_string(),
        received_by_user_id: receiver.to_string(),
        amount: cents(amount),
        date: day(2025, 3, 2),
        note: None,
    }
}

pub fn group_settlement(id: &str, group: &str, payer: &str, receiver: &str, amount: i64) -> Settlement {
    Settlement {
        group_id: Some(group.to_string()),
        ..settlement(id, payer, receiver, amount)
    }
}

/// A group whose first member is the admin.
pub fn group(id: &str, members: &[&str]) -> Group {
    Group {
        id: id.to_string(),
        name: format!("group {id}"),
        description: String::new(),
        created_by: members.first().map(|m| m.to_string()).unwrap_or_default(),
        members: members
            .iter()
            .enumerate()
            .map(|(i, user)| Membership {
                user_id: user.to_string(),
                role: if i == 0 { Role::Admin } else { Role::Member },
                joined_at: day(2025, 1, 1),
            })
            .collect(),
        invite_token: None,
    }
}
