use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Amount;

pub type UserId = String;
pub type GroupId = String;
pub type ExpenseId = String;
pub type SettlementId = String;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Membership {
    pub user_id: UserId,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_by: UserId,
    pub members: Vec<Membership>,
    #[serde(default)]
    pub invite_token: Option<String>,
}

impl Group {
    pub fn membership(&self, user_id: &str) -> Option<&Membership> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.membership(user_id).is_some()
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.membership(user_id)
            .is_some_and(|m| m.role == Role::Admin)
    }

    /// Member ids in membership order.
    pub fn member_ids(&self) -> Vec<UserId> {
        self.members.iter().map(|m| m.user_id.clone()).collect()
    }
}

/// One participant's share of an expense.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Split {
    pub user_id: UserId,
    pub amount: Amount,
    #[serde(default)]
    pub paid: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Expense {
    pub id: ExpenseId,
    /// `None` for one-to-one expenses.
    #[serde(default)]
    pub group_id: Option<GroupId>,
    pub paid_by_user_id: UserId,
    pub date: DateTime<Utc>,
    pub amount: Amount,
    pub description: String,
    pub splits: Vec<Split>,
}

impl Expense {
    pub fn is_direct(&self) -> bool {
        self.group_id.is_none()
    }

    pub fn split_of(&self, user_id: &str) -> Option<&Split> {
        self.splits.iter().find(|s| s.user_id == user_id)
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.paid_by_user_id == user_id || self.split_of(user_id).is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Settlement {
    pub id: SettlementId,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    pub paid_by_user_id: UserId,
    pub received_by_user_id: UserId,
    pub amount: Amount,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
}

impl Settlement {
    pub fn is_direct(&self) -> bool {
        self.group_id.is_none()
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.paid_by_user_id == user_id || self.received_by_user_id == user_id
    }
}
