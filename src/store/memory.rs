use futures::future::{BoxFuture, FutureExt};
use tokio::sync::RwLock;

use crate::error::{LedgerError, LedgerResult};
use crate::schemas::{Expense, Group, Membership, Settlement, User};

use super::LedgerStore;

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    groups: Vec<Group>,
    expenses: Vec<Expense>,
    settlements: Vec<Settlement>,
}

/// In-process store. Rows keep insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn get_user<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, LedgerResult<Option<User>>> {
        async move {
            let tables = self.tables.read().await;
            Ok(tables.users.iter().find(|u| u.id == user_id).cloned())
        }
        .boxed()
    }

    fn list_users(&self) -> BoxFuture<'_, LedgerResult<Vec<User>>> {
        async move { Ok(self.tables.read().await.users.clone()) }.boxed()
    }

    fn insert_user(&self, user: User) -> BoxFuture<'_, LedgerResult<()>> {
        async move {
            self.tables.write().await.users.push(user);
            Ok(())
        }
        .boxed()
    }

    fn get_group<'a>(&'a self, group_id: &'a str) -> BoxFuture<'a, LedgerResult<Option<Group>>> {
        async move {
            let tables = self.tables.read().await;
            Ok(tables.groups.iter().find(|g| g.id == group_id).cloned())
        }
        .boxed()
    }

    fn find_group_by_invite_token<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, LedgerResult<Option<Group>>> {
        async move {
            let tables = self.tables.read().await;
            Ok(tables
                .groups
                .iter()
                .find(|g| g.invite_token.as_deref() == Some(token))
                .cloned())
        }
        .boxed()
    }

    fn groups_for_user<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, LedgerResult<Vec<Group>>> {
        async move {
            let tables = self.tables.read().await;
            Ok(tables
                .groups
                .iter()
                .filter(|g| g.is_member(user_id))
                .cloned()
                .collect())
        }
        .boxed()
    }

    fn insert_group(&self, group: Group) -> BoxFuture<'_, LedgerResult<()>> {
        async move {
            self.tables.write().await.groups.push(group);
            Ok(())
        }
        .boxed()
    }

    fn set_invite_token<'a>(
        &'a self,
        group_id: &'a str,
        token: &'a str,
    ) -> BoxFuture<'a, LedgerResult<()>> {
        async move {
            let mut tables = self.tables.write().await;
            let group = tables
                .groups
                .iter_mut()
                .find(|g| g.id == group_id)
                .ok_or_else(|| LedgerError::not_found(format!("group {group_id}")))?;
            group.invite_token = Some(token.to_string());
            Ok(())
        }
        .boxed()
    }

    fn add_member<'a>(
        &'a self,
        group_id: &'a str,
        membership: Membership,
    ) -> BoxFuture<'a, LedgerResult<()>> {
        async move {
            let mut tables = self.tables.write().await;
            let group = tables
                .groups
                .iter_mut()
                .find(|g| g.id == group_id)
                .ok_or_else(|| LedgerError::not_found(format!("group {group_id}")))?;
            group.members.push(membership);
            Ok(())
        }
        .boxed()
    }

    fn group_expenses<'a>(&'a self, group_id: &'a str) -> BoxFuture<'a, LedgerResult<Vec<Expense>>> {
        async move {
            let tables = self.tables.read().await;
            Ok(tables
                .expenses
                .iter()
                .filter(|e| e.group_id.as_deref() == Some(group_id))
                .cloned()
                .collect())
        }
        .boxed()
    }

    fn group_settlements<'a>(
        &'a self,
        group_id: &'a str,
    ) -> BoxFuture<'a, LedgerResult<Vec<Settlement>>> {
        async move {
            let tables = self.tables.read().await;
            Ok(tables
                .settlements
                .iter()
                .filter(|s| s.group_id.as_deref() == Some(group_id))
                .cloned()
                .collect())
        }
        .boxed()
    }

    fn direct_expenses_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, LedgerResult<Vec<Expense>>> {
        async move {
            let tables = self.tables.read().await;
            Ok(tables
                .expenses
                .iter()
                .filter(|e| e.is_direct() && e.involves(user_id))
                .cloned()
                .collect())
        }
        .boxed()
    }

    fn direct_settlements_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, LedgerResult<Vec<Settlement>>> {
        async move {
            let tables = self.tables.read().await;
            Ok(tables
                .settlements
                .iter()
                .filter(|s| s.is_direct() && s.involves(user_id))
                .cloned()
                .collect())
        }
        .boxed()
    }

    fn expenses_for_user<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, LedgerResult<Vec<Expense>>> {
        async move {
            let tables = self.tables.read().await;
            Ok(tables
                .expenses
                .iter()
                .filter(|e| e.involves(user_id))
                .cloned()
                .collect())
        }
        .boxed()
    }

    fn insert_expense(&self, expense: Expense) -> BoxFuture<'_, LedgerResult<()>> {
        async move {
            self.tables.write().await.expenses.push(expense);
            Ok(())
        }
        .boxed()
    }

    fn insert_settlement(&self, settlement: Settlement) -> BoxFuture<'_, LedgerResult<()>> {
        async move {
            self.tables.write().await.settlements.push(settlement);
            Ok(())
        }
        .boxed()
    }
}
