//! Data access used by the services.
//!
//! Every read returns a snapshot; the balance computations only ever see
//! what a single call returned.
use futures::future::BoxFuture;

use crate::error::LedgerResult;
use crate::schemas::{Expense, Group, Membership, Settlement, User};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

pub trait LedgerStore: Send + Sync {
    fn get_user<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, LedgerResult<Option<User>>>;

    fn list_users(&self) -> BoxFuture<'_, LedgerResult<Vec<User>>>;

    fn insert_user(&self, user: User) -> BoxFuture<'_, LedgerResult<()>>;

    fn get_group<'a>(&'a self, group_id: &'a str) -> BoxFuture<'a, LedgerResult<Option<Group>>>;

    fn find_group_by_invite_token<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, LedgerResult<Option<Group>>>;

    /// Groups that list `user_id` among their members.
    fn groups_for_user<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, LedgerResult<Vec<Group>>>;

    fn insert_group(&self, group: Group) -> BoxFuture<'_, LedgerResult<()>>;

    fn set_invite_token<'a>(
        &'a self,
        group_id: &'a str,
        token: &'a str,
    ) -> BoxFuture<'a, LedgerResult<()>>;

    fn add_member<'a>(
        &'a self,
        group_id: &'a str,
        membership: Membership,
    ) -> BoxFuture<'a, LedgerResult<()>>;

    fn group_expenses<'a>(&'a self, group_id: &'a str) -> BoxFuture<'a, LedgerResult<Vec<Expense>>>;

    fn group_settlements<'a>(
        &'a self,
        group_id: &'a str,
    ) -> BoxFuture<'a, LedgerResult<Vec<Settlement>>>;

    /// One-to-one expenses where `user_id` paid or has a split.
    fn direct_expenses_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, LedgerResult<Vec<Expense>>>;

    /// One-to-one settlements where `user_id` paid or received.
    fn direct_settlements_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, LedgerResult<Vec<Settlement>>>;

    /// Group and one-to-one expenses where `user_id` paid or has a split.
    fn expenses_for_user<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, LedgerResult<Vec<Expense>>>;

    fn insert_expense(&self, expense: Expense) -> BoxFuture<'_, LedgerResult<()>>;

    fn insert_settlement(&self, settlement: Settlement) -> BoxFuture<'_, LedgerResult<()>>;
}
