use bson::{doc, Document};
use futures::future::{BoxFuture, FutureExt};
use futures::TryStreamExt;
use mongodb::{Client, Collection, Database};
use serde::de::DeserializeOwned;

use crate::error::{LedgerError, LedgerResult};
use crate::schemas::{Expense, Group, Membership, Settlement, User};

use super::LedgerStore;

/// Store backed by the `Users`, `Groups`, `Expenses` and `Settlements`
/// collections of one MongoDB database.
#[derive(Clone, Debug)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> LedgerResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        tracing::info!(database, "connected to MongoDB");
        Ok(Self::new(client.database(database)))
    }

    pub fn new(database: Database) -> Self {
        MongoStore { database }
    }

    fn users(&self) -> Collection<User> {
        self.database.collection("Users")
    }

    fn groups(&self) -> Collection<Group> {
        self.database.collection("Groups")
    }

    fn expenses(&self) -> Collection<Expense> {
        self.database.collection("Expenses")
    }

    fn settlements(&self) -> Collection<Settlement> {
        self.database.collection("Settlements")
    }
}

async fn find_all<T>(collection: Collection<T>, filter: Document) -> LedgerResult<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let cursor = collection.find(filter, None).await?;
    Ok(cursor.try_collect().await?)
}

// A missing `group_id` and an explicit null both match `null`.
fn one_to_one(mut filter: Document) -> Document {
    filter.insert("group_id", bson::Bson::Null);
    filter
}

impl LedgerStore for MongoStore {
    fn get_user<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, LedgerResult<Option<User>>> {
        async move { Ok(self.users().find_one(doc! { "id": user_id }, None).await?) }.boxed()
    }

    fn list_users(&self) -> BoxFuture<'_, LedgerResult<Vec<User>>> {
        find_all(self.users(), doc! {}).boxed()
    }

    fn insert_user(&self, user: User) -> BoxFuture<'_, LedgerResult<()>> {
        async move {
            self.users().insert_one(user, None).await?;
            Ok(())
        }
        .boxed()
    }

    fn get_group<'a>(&'a self, group_id: &'a str) -> BoxFuture<'a, LedgerResult<Option<Group>>> {
        async move { Ok(self.groups().find_one(doc! { "id": group_id }, None).await?) }.boxed()
    }

    fn find_group_by_invite_token<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, LedgerResult<Option<Group>>> {
        async move {
            Ok(self
                .groups()
                .find_one(doc! { "invite_token": token }, None)
                .await?)
        }
        .boxed()
    }

    fn groups_for_user<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, LedgerResult<Vec<Group>>> {
        find_all(self.groups(), doc! { "members.user_id": user_id }).boxed()
    }

    fn insert_group(&self, group: Group) -> BoxFuture<'_, LedgerResult<()>> {
        async move {
            self.groups().insert_one(group, None).await?;
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
            let result = self
                .groups()
                .update_one(
                    doc! { "id": group_id },
                    doc! { "$set": { "invite_token": token } },
                    None,
                )
                .await?;
            if result.matched_count == 0 {
                return Err(LedgerError::not_found(format!("group {group_id}")));
            }
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
            let membership = bson::to_bson(&membership)?;
            let result = self
                .groups()
                .update_one(
                    doc! { "id": group_id },
                    doc! { "$push": { "members": membership } },
                    None,
                )
                .await?;
            if result.matched_count == 0 {
                return Err(LedgerError::not_found(format!("group {group_id}")));
            }
            Ok(())
        }
        .boxed()
    }

    fn group_expenses<'a>(&'a self, group_id: &'a str) -> BoxFuture<'a, LedgerResult<Vec<Expense>>> {
        find_all(self.expenses(), doc! { "group_id": group_id }).boxed()
    }

    fn group_settlements<'a>(
        &'a self,
        group_id: &'a str,
    ) -> BoxFuture<'a, LedgerResult<Vec<Settlement>>> {
        find_all(self.settlements(), doc! { "group_id": group_id }).boxed()
    }

    fn direct_expenses_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, LedgerResult<Vec<Expense>>> {
        let filter = one_to_one(doc! {
            "$or": [ { "paid_by_user_id": user_id }, { "splits.user_id": user_id } ],
        });
        find_all(self.expenses(), filter).boxed()
    }

    fn direct_settlements_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, LedgerResult<Vec<Settlement>>> {
        let filter = one_to_one(doc! {
            "$or": [ { "paid_by_user_id": user_id }, { "received_by_user_id": user_id } ],
        });
        find_all(self.settlements(), filter).boxed()
    }

    fn expenses_for_user<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, LedgerResult<Vec<Expense>>> {
        let filter = doc! {
            "$or": [ { "paid_by_user_id": user_id }, { "splits.user_id": user_id } ],
        };
        find_all(self.expenses(), filter).boxed()
    }

    fn insert_expense(&self, expense: Expense) -> BoxFuture<'_, LedgerResult<()>> {
        async move {
            self.expenses().insert_one(expense, None).await?;
            Ok(())
        }
        .boxed()
    }

    fn insert_settlement(&self, settlement: Settlement) -> BoxFuture<'_, LedgerResult<()>> {
        async move {
            self.settlements().insert_one(settlement, None).await?;
            Ok(())
        }
        .boxed()
    }
}
