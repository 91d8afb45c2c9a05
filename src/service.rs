use chrono::{DateTime, Datelike, NaiveDate, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::balance::{compute_group_balance, compute_user_balances, Counterparty};
use crate::error::{LedgerError, LedgerResult};
use crate::exchange::{authorize_member, build_group_ledger, Exchange, GroupLedger, OwedBy, Owes};
use crate::ledger::{expense_debts, settlement_credit};
use crate::money::Amount;
use crate::netting::PairwiseLedger;
use crate::schemas::{
    Expense, Group, GroupId, Membership, Role, Settlement, Split, User, UserId,
};
use crate::store::LedgerStore;

const UNKNOWN_USER: &str = "Unknown";
const INVITE_TOKEN_LEN: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CounterpartyDetails {
    pub user_id: UserId,
    pub name: String,
    pub image_url: Option<String>,
    pub amount: Amount,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OweDetailsView {
    pub you_owe: Vec<CounterpartyDetails>,
    pub you_are_owed_by: Vec<CounterpartyDetails>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UserBalancesView {
    pub you_owe: Amount,
    pub you_are_owed: Amount,
    pub total_balance: Amount,
    pub owe_details: OweDetailsView,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemberDetails {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub role: Role,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GroupInfo {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub invite_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemberBalanceView {
    #[serde(flatten)]
    pub member: MemberDetails,
    pub total_balance: Amount,
    pub owes: Vec<Owes>,
    pub owed_by: Vec<OwedBy>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupLedgerView {
    pub group: GroupInfo,
    pub members: Vec<MemberDetails>,
    pub expenses: Vec<Expense>,
    pub settlements: Vec<Settlement>,
    pub balances: Vec<MemberBalanceView>,
    pub exchanges: Vec<Exchange>,
    pub user_lookup_map: BTreeMap<UserId, MemberDetails>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub member_count: usize,
}

impl From<&Group> for GroupSummary {
    fn from(group: &Group) -> Self {
        GroupSummary {
            id: group.id.clone(),
            name: group.name.clone(),
            description: group.description.clone(),
            member_count: group.members.len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserGroupBalance {
    #[serde(flatten)]
    pub group: GroupSummary,
    pub balance: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectedGroup {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub created_by: UserId,
    pub members: Vec<MemberDetails>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GroupOrMembers {
    pub selected_group: Option<SelectedGroup>,
    pub groups: Vec<GroupSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PersonLedger {
    pub other_user: User,
    pub expenses: Vec<Expense>,
    pub settlements: Vec<Settlement>,
    /// Positive when the other user owes the caller.
    pub balance: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonthlyTotal {
    pub month: DateTime<Utc>,
    pub total: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutstandingDebts {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub debts: Vec<CounterpartyDetails>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Initial members besides the creator.
    #[serde(default)]
    pub members: Vec<UserId>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewExpense {
    #[serde(default)]
    pub group_id: Option<GroupId>,
    pub paid_by_user_id: UserId,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    pub amount: Amount,
    pub description: String,
    pub splits: Vec<Split>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewSettlement {
    #[serde(default)]
    pub group_id: Option<GroupId>,
    pub paid_by_user_id: UserId,
    pub received_by_user_id: UserId,
    pub amount: Amount,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Entry points of the ledger. The acting user is always passed in.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        LedgerService { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn user_balances(&self, user: &str) -> LedgerResult<UserBalancesView> {
        let (expenses, settlements) = futures::try_join!(
            self.store.direct_expenses_for_user(user),
            self.store.direct_settlements_for_user(user),
        )?;
        let balances = compute_user_balances(user, &expenses, &settlements);
        tracing::debug!(total = %balances.total_balance, "user balances computed");

        Ok(UserBalancesView {
            you_owe: balances.you_owe,
            you_are_owed: balances.you_are_owed,
            total_balance: balances.total_balance,
            owe_details: OweDetailsView {
                you_owe: self.describe(balances.owe_details.you_owe).await?,
                you_are_owed_by: self.describe(balances.owe_details.you_are_owed_by).await?,
            },
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn group_ledger(&self, group_id: &str, requester: &str) -> LedgerResult<GroupLedgerView> {
        let group = self.store.get_group(group_id).await?;
        let group = authorize_member(group.as_ref(), requester)?;

        let (expenses, settlements, users) = futures::try_join!(
            self.store.group_expenses(group_id),
            self.store.group_settlements(group_id),
            self.member_users(group),
        )?;

        let members: Vec<MemberDetails> = group
            .members
            .iter()
            .zip(users)
            .map(|(membership, user)| member_details(membership, user))
            .collect();
        let user_lookup_map: BTreeMap<UserId, MemberDetails> = members
            .iter()
            .map(|m| (m.id.clone(), m.clone()))
            .collect();

        let ledger = build_group_ledger(&group.member_ids(), &expenses, &settlements);
        tracing::debug!(exchanges = ledger.exchanges.len(), "group ledger simplified");

        let GroupLedger {
            balances,
            exchanges,
        } = ledger;
        let balances = balances
            .into_iter()
            .filter_map(|balance| {
                let member = user_lookup_map.get(&balance.user_id)?.clone();
                Some(MemberBalanceView {
                    member,
                    total_balance: balance.total_balance,
                    owes: balance.owes,
                    owed_by: balance.owed_by,
                })
            })
            .collect();

        Ok(GroupLedgerView {
            group: GroupInfo {
                id: group.id.clone(),
                name: group.name.clone(),
                description: group.description.clone(),
                invite_token: group.invite_token.clone(),
            },
            members,
            expenses,
            settlements,
            balances,
            exchanges,
            user_lookup_map,
        })
    }

    /// Every group of `user` with the user's signed balance in it.
    #[tracing::instrument(skip(self))]
    pub async fn user_groups(&self, user: &str) -> LedgerResult<Vec<UserGroupBalance>> {
        let groups = self.store.groups_for_user(user).await?;
        try_join_all(groups.iter().map(|group| async move {
            let (expenses, settlements) = futures::try_join!(
                self.store.group_expenses(&group.id),
                self.store.group_settlements(&group.id),
            )?;
            Ok::<_, LedgerError>(UserGroupBalance {
                group: GroupSummary::from(group),
                balance: compute_group_balance(user, &group.id, &expenses, &settlements),
            })
        }))
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn group_or_members(
        &self,
        user: &str,
        selected: Option<&str>,
    ) -> LedgerResult<GroupOrMembers> {
        let groups = self.store.groups_for_user(user).await?;

        let selected_group = match selected {
            None => None,
            Some(group_id) => {
                let group = groups
                    .iter()
                    .find(|g| g.id == group_id)
                    .ok_or_else(|| LedgerError::not_found("group or membership"))?;
                let users = self.member_users(group).await?;
                let members = group
                    .members
                    .iter()
                    .zip(users)
                    .filter(|(_, user)| user.is_some())
                    .map(|(membership, user)| member_details(membership, user))
                    .collect();
                Some(SelectedGroup {
                    id: group.id.clone(),
                    name: group.name.clone(),
                    description: group.description.clone(),
                    created_by: group.created_by.clone(),
                    members,
                })
            }
        };

        Ok(GroupOrMembers {
            selected_group,
            groups: groups.iter().map(GroupSummary::from).collect(),
        })
    }

    /// One-to-one history between `user` and `other`, netted to one amount.
    #[tracing::instrument(skip(self))]
    pub async fn balance_between(&self, user: &str, other: &str) -> LedgerResult<PersonLedger> {
        let other_user = self
            .store
            .get_user(other)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("user {other}")))?;
        let (expenses, settlements) = futures::try_join!(
            self.store.direct_expenses_for_user(user),
            self.store.direct_settlements_for_user(user),
        )?;

        let between = |a: &str, b: &str| (a == user && b == other) || (a == other && b == user);
        let expenses: Vec<Expense> = expenses
            .into_iter()
            .filter(|e| {
                e.splits
                    .iter()
                    .any(|s| between(e.paid_by_user_id.as_str(), s.user_id.as_str()))
            })
            .collect();
        let settlements: Vec<Settlement> = settlements
            .into_iter()
            .filter(|s| between(s.paid_by_user_id.as_str(), s.received_by_user_id.as_str()))
            .collect();

        let mut pairs = PairwiseLedger::new();
        for debt in expenses.iter().flat_map(expense_debts) {
            pairs.record(debt);
        }
        for settlement in &settlements {
            pairs.record(settlement_credit(settlement));
        }
        let balance = pairs.net_between(other, user);

        Ok(PersonLedger {
            other_user,
            expenses,
            settlements,
            balance,
        })
    }

    /// Sum of the user's own shares over expenses dated in `year` (UTC).
    #[tracing::instrument(skip(self))]
    pub async fn total_spent(&self, user: &str, year: i32) -> LedgerResult<Amount> {
        let expenses = self.store.expenses_for_user(user).await?;
        Ok(own_shares_in_year(&expenses, user, year)
            .map(|(_, amount)| amount)
            .sum())
    }

    /// The user's own shares in `year`, bucketed by month, January first.
    #[tracing::instrument(skip(self))]
    pub async fn monthly_spending(&self, user: &str, year: i32) -> LedgerResult<Vec<MonthlyTotal>> {
        let expenses = self.store.expenses_for_user(user).await?;
        let mut totals = [Amount::ZERO; 12];
        for (month0, amount) in own_shares_in_year(&expenses, user, year) {
            totals[month0] += amount;
        }

        Ok(totals
            .into_iter()
            .zip(1u32..)
            .filter_map(|(total, month)| {
                let month = NaiveDate::from_ymd_opt(year, month, 1)?
                    .and_hms_opt(0, 0, 0)?
                    .and_utc();
                Some(MonthlyTotal { month, total })
            })
            .collect())
    }

    /// Replaces the group's invite token. Admins only.
    #[tracing::instrument(skip(self))]
    pub async fn generate_invite_token(&self, group_id: &str, requester: &str) -> LedgerResult<String> {
        let group = self
            .store
            .get_group(group_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("group {group_id}")))?;
        if !group.is_admin(requester) {
            return Err(LedgerError::forbidden("only admins can generate invite links"));
        }

        let token: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(INVITE_TOKEN_LEN)
            .collect();
        self.store.set_invite_token(group_id, &token).await?;
        tracing::info!(group_id, "invite token regenerated");
        Ok(token)
    }

    /// Adds `user` to the group holding `token`. Joining twice is a no-op.
    #[tracing::instrument(skip(self, token))]
    pub async fn join_group_by_token(&self, token: &str, user: &str) -> LedgerResult<GroupId> {
        let group = self
            .store
            .find_group_by_invite_token(token)
            .await?
            .ok_or_else(|| LedgerError::invalid_state("invalid invite link"))?;
        if group.is_member(user) {
            return Ok(group.id);
        }

        let membership = Membership {
            user_id: user.to_string(),
            role: Role::Member,
            joined_at: Utc::now(),
        };
        self.store.add_member(&group.id, membership).await?;
        tracing::info!(group_id = %group.id, "user joined group");
        Ok(group.id)
    }

    #[tracing::instrument(skip(self, new_group), fields(name = %new_group.name))]
    pub async fn create_group(&self, creator: &str, new_group: NewGroup) -> LedgerResult<Group> {
        if new_group.name.trim().is_empty() {
            return Err(LedgerError::invalid_state("group name cannot be empty"));
        }

        let now = Utc::now();
        let mut seen = HashSet::from([creator.to_string()]);
        let mut members = vec![Membership {
            user_id: creator.to_string(),
            role: Role::Admin,
            joined_at: now,
        }];
        for user_id in new_group.members {
            if seen.insert(user_id.clone()) {
                members.push(Membership {
                    user_id,
                    role: Role::Member,
                    joined_at: now,
                });
            }
        }

        let group = Group {
            id: Uuid::new_v4().to_string(),
            name: new_group.name,
            description: new_group.description,
            created_by: creator.to_string(),
            members,
            invite_token: None,
        };
        self.store.insert_group(group.clone()).await?;
        tracing::info!(group_id = %group.id, "group created");
        Ok(group)
    }

    #[tracing::instrument(skip(self, new_expense), fields(amount = %new_expense.amount))]
    pub async fn add_expense(&self, requester: &str, new_expense: NewExpense) -> LedgerResult<Expense> {
        validate_expense(&new_expense)?;

        let participants = std::iter::once(new_expense.paid_by_user_id.as_str())
            .chain(new_expense.splits.iter().map(|s| s.user_id.as_str()));
        match &new_expense.group_id {
            Some(group_id) => {
                let group = self.store.get_group(group_id).await?;
                let group = authorize_member(group.as_ref(), requester)?;
                ensure_members(group, participants)?;
            }
            None => {
                if !participants.clone().any(|p| p == requester) {
                    return Err(LedgerError::forbidden(
                        "a one-to-one expense must involve the requester",
                    ));
                }
            }
        }

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            group_id: new_expense.group_id,
            paid_by_user_id: new_expense.paid_by_user_id,
            date: new_expense.date.unwrap_or_else(Utc::now),
            amount: new_expense.amount,
            description: new_expense.description,
            splits: new_expense.splits,
        };
        self.store.insert_expense(expense.clone()).await?;
        tracing::info!(expense_id = %expense.id, "expense recorded");
        Ok(expense)
    }

    #[tracing::instrument(skip(self, new_settlement), fields(amount = %new_settlement.amount))]
    pub async fn add_settlement(
        &self,
        requester: &str,
        new_settlement: NewSettlement,
    ) -> LedgerResult<Settlement> {
        if new_settlement.amount.is_negative() {
            return Err(LedgerError::InvalidAmount(
                "a settlement cannot be negative".to_string(),
            ));
        }
        if new_settlement.paid_by_user_id == new_settlement.received_by_user_id {
            return Err(LedgerError::invalid_state("a settlement needs two different users"));
        }

        let parties = [
            new_settlement.paid_by_user_id.as_str(),
            new_settlement.received_by_user_id.as_str(),
        ];
        match &new_settlement.group_id {
            Some(group_id) => {
                let group = self.store.get_group(group_id).await?;
                let group = authorize_member(group.as_ref(), requester)?;
                ensure_members(group, parties.into_iter())?;
            }
            None => {
                if !parties.contains(&requester) {
                    return Err(LedgerError::forbidden(
                        "a one-to-one settlement must involve the requester",
                    ));
                }
            }
        }

        let settlement = Settlement {
            id: Uuid::new_v4().to_string(),
            group_id: new_settlement.group_id,
            paid_by_user_id: new_settlement.paid_by_user_id,
            received_by_user_id: new_settlement.received_by_user_id,
            amount: new_settlement.amount,
            date: new_settlement.date.unwrap_or_else(Utc::now),
            note: new_settlement.note,
        };
        self.store.insert_settlement(settlement.clone()).await?;
        tracing::info!(settlement_id = %settlement.id, "settlement recorded");
        Ok(settlement)
    }

    /// Users that still owe money, one-to-one and across their groups, with
    /// what they owe to whom. Feeds payment reminders.
    #[tracing::instrument(skip(self))]
    pub async fn outstanding_debts(&self) -> LedgerResult<Vec<OutstandingDebts>> {
        let users = self.store.list_users().await?;
        let mut ledgers: HashMap<GroupId, GroupLedger> = HashMap::new();
        let mut report = Vec::new();

        for user in users {
            let (expenses, settlements, groups) = futures::try_join!(
                self.store.direct_expenses_for_user(&user.id),
                self.store.direct_settlements_for_user(&user.id),
                self.store.groups_for_user(&user.id),
            )?;

            let mut owed: BTreeMap<UserId, Amount> = BTreeMap::new();
            for entry in compute_user_balances(&user.id, &expenses, &settlements)
                .owe_details
                .you_owe
            {
                *owed.entry(entry.user_id).or_default() += entry.amount;
            }
            for group in &groups {
                if !ledgers.contains_key(&group.id) {
                    let ledger = self.load_group_ledger(group).await?;
                    ledgers.insert(group.id.clone(), ledger);
                }
                let owes = ledgers
                    .get(&group.id)
                    .and_then(|ledger| ledger.balance_of(&user.id))
                    .map(|balance| balance.owes.as_slice())
                    .unwrap_or_default();
                for edge in owes {
                    *owed.entry(edge.to.clone()).or_default() += edge.amount;
                }
            }

            if owed.is_empty() {
                continue;
            }
            let mut debts: Vec<Counterparty> = owed
                .into_iter()
                .map(|(user_id, amount)| Counterparty { user_id, amount })
                .collect();
            debts.sort_by(|a, b| b.amount.cmp(&a.amount));

            report.push(OutstandingDebts {
                debts: self.describe(debts).await?,
                user_id: user.id,
                name: user.name,
                email: user.email,
            });
        }

        tracing::info!(users = report.len(), "outstanding debts collected");
        Ok(report)
    }

    async fn load_group_ledger(&self, group: &Group) -> LedgerResult<GroupLedger> {
        let (expenses, settlements) = futures::try_join!(
            self.store.group_expenses(&group.id),
            self.store.group_settlements(&group.id),
        )?;
        Ok(build_group_ledger(&group.member_ids(), &expenses, &settlements))
    }

    // User records of the group's members, in membership order.
    async fn member_users(&self, group: &Group) -> LedgerResult<Vec<Option<User>>> {
        try_join_all(group.members.iter().map(|m| self.store.get_user(&m.user_id))).await
    }

    async fn describe(&self, entries: Vec<Counterparty>) -> LedgerResult<Vec<CounterpartyDetails>> {
        try_join_all(entries.into_iter().map(|entry| async move {
            let user = self.store.get_user(&entry.user_id).await?;
            Ok::<_, LedgerError>(CounterpartyDetails {
                name: user
                    .as_ref()
                    .map_or_else(|| UNKNOWN_USER.to_string(), |u| u.name.clone()),
                image_url: user.and_then(|u| u.image_url),
                user_id: entry.user_id,
                amount: entry.amount,
            })
        }))
        .await
    }
}

fn member_details(membership: &Membership, user: Option<User>) -> MemberDetails {
    match user {
        Some(user) => MemberDetails {
            id: user.id,
            name: user.name,
            email: Some(user.email),
            image_url: user.image_url,
            role: membership.role,
        },
        None => MemberDetails {
            id: membership.user_id.clone(),
            name: UNKNOWN_USER.to_string(),
            email: None,
            image_url: None,
            role: membership.role,
        },
    }
}

fn ensure_members<'a>(group: &Group, mut users: impl Iterator<Item = &'a str>) -> LedgerResult<()> {
    match users.find(|user| !group.is_member(user)) {
        Some(outsider) => Err(LedgerError::forbidden(format!(
            "{outsider} is not a member of group {}",
            group.id
        ))),
        None => Ok(()),
    }
}

fn validate_expense(expense: &NewExpense) -> LedgerResult<()> {
    if expense.amount.is_negative() || expense.splits.iter().any(|s| s.amount.is_negative()) {
        return Err(LedgerError::InvalidAmount(
            "expense amounts cannot be negative".to_string(),
        ));
    }
    if expense.splits.is_empty() {
        return Err(LedgerError::invalid_state("an expense needs at least one split"));
    }
    let split_total = Amount::checked_sum(expense.splits.iter().map(|s| s.amount))?;
    if split_total != expense.amount {
        return Err(LedgerError::invalid_state(format!(
            "splits add up to {split_total}, expected {}",
            expense.amount
        )));
    }
    let mut seen = HashSet::new();
    if !expense.splits.iter().all(|s| seen.insert(s.user_id.as_str())) {
        return Err(LedgerError::invalid_state("a user can only have one split per expense"));
    }
    Ok(())
}

// (zero-based month, own share) for every expense of `year` the user has a
// split in.
fn own_shares_in_year<'a>(
    expenses: &'a [Expense],
    user: &'a str,
    year: i32,
) -> impl Iterator<Item = (usize, Amount)> + 'a {
    expenses
        .iter()
        .filter(move |e| e.date.year() == year)
        .filter_map(move |e| {
            let split = e.split_of(user)?;
            Some((e.date.month0() as usize, split.amount))
        })
}
