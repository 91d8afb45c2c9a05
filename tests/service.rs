use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use splitledger::exchange::{Exchange, OwedBy, Owes};
use splitledger::schemas::{Expense, Group, Membership, Role, Settlement, Split, User};
use splitledger::service::{LedgerService, NewExpense, NewGroup, NewSettlement};
use splitledger::store::{LedgerStore, MemoryStore};
use splitledger::{Amount, LedgerError};

fn cents(value: i64) -> Amount {
    Amount::from_cents(value)
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 30, 0).unwrap()
}

fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        name: format!("User {id}"),
        email: format!("{id}@example.com"),
        image_url: None,
    }
}

fn group(id: &str, members: &[&str]) -> Group {
    Group {
        id: id.to_string(),
        name: format!("Trip {id}"),
        description: "shared costs".to_string(),
        created_by: members[0].to_string(),
        members: members
            .iter()
            .enumerate()
            .map(|(i, m)| Membership {
                user_id: m.to_string(),
                role: if i == 0 { Role::Admin } else { Role::Member },
                joined_at: at(2025, 1, 1),
            })
            .collect(),
        invite_token: None,
    }
}

fn expense(id: &str, group_id: Option<&str>, payer: &str, splits: &[(&str, i64)]) -> Expense {
    let splits: Vec<Split> = splits
        .iter()
        .map(|&(user, amount)| Split {
            user_id: user.to_string(),
            amount: cents(amount),
            paid: false,
        })
        .collect();
    Expense {
        id: id.to_string(),
        group_id: group_id.map(str::to_string),
        paid_by_user_id: payer.to_string(),
        date: at(2025, 3, 14),
        amount: splits.iter().map(|s| s.amount).sum(),
        description: format!("expense {id}"),
        splits,
    }
}

fn settlement(id: &str, group_id: Option<&str>, payer: &str, receiver: &str, amount: i64) -> Settlement {
    Settlement {
        id: id.to_string(),
        group_id: group_id.map(str::to_string),
        paid_by_user_id: payer.to_string(),
        received_by_user_id: receiver.to_string(),
        amount: cents(amount),
        date: at(2025, 3, 15),
        note: None,
    }
}

async fn seeded(users: &[&str]) -> (Arc<MemoryStore>, LedgerService) {
    let store = Arc::new(MemoryStore::new());
    for id in users {
        store.insert_user(user(id)).await.unwrap();
    }
    let service = LedgerService::new(store.clone());
    (store, service)
}

async fn trip_with_even_split() -> (Arc<MemoryStore>, LedgerService) {
    let (store, service) = seeded(&["u1", "u2", "u3"]).await;
    store.insert_group(group("g1", &["u1", "u2", "u3"])).await.unwrap();
    store
        .insert_expense(expense("e1", Some("g1"), "u1", &[("u1", 2000), ("u2", 2000), ("u3", 2000)]))
        .await
        .unwrap();
    (store, service)
}

#[tokio::test]
async fn even_split_group_ledger() {
    let (_, service) = trip_with_even_split().await;
    let view = service.group_ledger("g1", "u2").await.unwrap();

    let totals: Vec<_> = view.balances.iter().map(|b| (b.member.id.as_str(), b.total_balance)).collect();
    assert_eq!(totals, vec![("u1", cents(4000)), ("u2", cents(-2000)), ("u3", cents(-2000))]);
    assert_eq!(
        view.balances[0].owed_by,
        vec![
            OwedBy { from: "u2".to_string(), amount: cents(2000) },
            OwedBy { from: "u3".to_string(), amount: cents(2000) },
        ]
    );
    assert_eq!(view.balances[1].owes, vec![Owes { to: "u1".to_string(), amount: cents(2000) }]);
    assert_eq!(view.members.len(), 3);
    assert_eq!(view.user_lookup_map["u3"].name, "User u3");
    assert_eq!(view.expenses.len(), 1);
}

#[tokio::test]
async fn settlement_after_even_split() {
    let (store, service) = trip_with_even_split().await;
    store
        .insert_settlement(settlement("s1", Some("g1"), "u2", "u1", 1000))
        .await
        .unwrap();

    let view = service.group_ledger("g1", "u1").await.unwrap();
    assert_eq!(view.balances[0].total_balance, cents(3000));
    assert_eq!(view.balances[1].total_balance, cents(-1000));
    assert_eq!(view.balances[1].owes, vec![Owes { to: "u1".to_string(), amount: cents(1000) }]);
    assert_eq!(view.balances[2].owes, vec![Owes { to: "u1".to_string(), amount: cents(2000) }]);
}

#[tokio::test]
async fn three_way_cycle_stays_pairwise() {
    let (store, service) = seeded(&["u1", "u2", "u3"]).await;
    store.insert_group(group("g1", &["u1", "u2", "u3"])).await.unwrap();
    for e in [
        expense("e1", Some("g1"), "u2", &[("u1", 1000)]),
        expense("e2", Some("g1"), "u3", &[("u2", 1500)]),
        expense("e3", Some("g1"), "u1", &[("u3", 500)]),
    ] {
        store.insert_expense(e).await.unwrap();
    }

    let view = service.group_ledger("g1", "u1").await.unwrap();
    let edge = |payer: &str, receiver: &str, amount| Exchange {
        payer: payer.to_string(),
        receiver: receiver.to_string(),
        amount: cents(amount),
    };
    assert_eq!(
        view.exchanges,
        vec![edge("u1", "u2", 1000), edge("u3", "u1", 500), edge("u2", "u3", 1500)]
    );
}

#[tokio::test]
async fn user_without_records_has_zero_balances() {
    let (_, service) = seeded(&["u1"]).await;
    let view = service.user_balances("u1").await.unwrap();
    assert_eq!(view.you_owe, Amount::ZERO);
    assert_eq!(view.you_are_owed, Amount::ZERO);
    assert_eq!(view.total_balance, Amount::ZERO);
    assert!(view.owe_details.you_owe.is_empty());
    assert!(view.owe_details.you_are_owed_by.is_empty());
}

#[tokio::test]
async fn non_member_cannot_read_group_ledger() {
    let (_, service) = trip_with_even_split().await;
    let err = service.group_ledger("g1", "outsider").await.unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
    let err = service.group_ledger("missing", "u1").await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn user_balances_name_counterparties() {
    let (store, service) = seeded(&["u1", "u2"]).await;
    store
        .insert_expense(expense("e1", None, "u1", &[("u1", 500), ("u2", 500), ("gone", 700)]))
        .await
        .unwrap();
    store
        .insert_expense(expense("e2", None, "u2", &[("u1", 1200), ("u2", 1200)]))
        .await
        .unwrap();
    store
        .insert_expense(expense("e3", Some("g1"), "u2", &[("u1", 9999)]))
        .await
        .unwrap();

    let view = service.user_balances("u1").await.unwrap();
    assert_eq!(view.you_are_owed, cents(1200));
    assert_eq!(view.you_owe, cents(1200));
    assert_eq!(view.total_balance, Amount::ZERO);

    let owed_by = &view.owe_details.you_are_owed_by;
    assert_eq!(owed_by.len(), 1);
    assert_eq!(owed_by[0].user_id, "gone");
    assert_eq!(owed_by[0].name, "Unknown");
    assert_eq!(owed_by[0].amount, cents(700));

    let owe = &view.owe_details.you_owe;
    assert_eq!(owe.len(), 1);
    assert_eq!(owe[0].name, "User u2");
    assert_eq!(owe[0].amount, cents(700));
}

#[tokio::test]
async fn user_groups_carry_signed_balance() {
    let (store, service) = trip_with_even_split().await;
    store.insert_group(group("g2", &["u2", "u1"])).await.unwrap();
    store
        .insert_expense(expense("e2", Some("g2"), "u2", &[("u1", 800)]))
        .await
        .unwrap();
    store
        .insert_settlement(settlement("s1", Some("g1"), "u2", "u1", 1000))
        .await
        .unwrap();

    let groups = service.user_groups("u1").await.unwrap();
    let balances: Vec<_> = groups.iter().map(|g| (g.group.id.as_str(), g.balance)).collect();
    assert_eq!(balances, vec![("g1", cents(3000)), ("g2", cents(-800))]);
    assert_eq!(groups[0].group.member_count, 3);
}

#[tokio::test]
async fn group_or_members_lists_and_selects() {
    let (store, service) = trip_with_even_split().await;
    store.insert_group(group("g2", &["u2", "u3"])).await.unwrap();

    let plain = service.group_or_members("u1", None).await.unwrap();
    assert!(plain.selected_group.is_none());
    assert_eq!(plain.groups.len(), 1);

    let selected = service.group_or_members("u1", Some("g1")).await.unwrap();
    let members = selected.selected_group.unwrap().members;
    assert_eq!(members.len(), 3);
    assert_eq!(members[0].role, Role::Admin);
    assert_eq!(members[0].email.as_deref(), Some("u1@example.com"));

    let err = service.group_or_members("u1", Some("g2")).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn balance_between_two_people() {
    let (store, service) = seeded(&["u1", "u2", "u3"]).await;
    store
        .insert_expense(expense("e1", None, "u1", &[("u1", 1000), ("u2", 1000), ("u3", 1000)]))
        .await
        .unwrap();
    store
        .insert_expense(expense("e2", None, "u2", &[("u1", 300)]))
        .await
        .unwrap();
    store
        .insert_settlement(settlement("s1", None, "u2", "u1", 200))
        .await
        .unwrap();
    store
        .insert_settlement(settlement("s2", None, "u3", "u1", 1000))
        .await
        .unwrap();

    let person = service.balance_between("u1", "u2").await.unwrap();
    assert_eq!(person.other_user.id, "u2");
    assert_eq!(person.expenses.len(), 2);
    assert_eq!(person.settlements.len(), 1);
    // 1000 owed to u1, minus 300 u1 owes, minus 200 settled
    assert_eq!(person.balance, cents(500));

    let mirrored = service.balance_between("u2", "u1").await.unwrap();
    assert_eq!(mirrored.balance, cents(-500));

    let err = service.balance_between("u1", "nobody").await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn spending_counts_own_shares_per_month() {
    let (store, service) = seeded(&["u1", "u2"]).await;
    let mut january = expense("e1", None, "u2", &[("u1", 1500), ("u2", 1500)]);
    january.date = at(2025, 1, 20);
    let mut march = expense("e2", Some("g1"), "u1", &[("u1", 400), ("u2", 600)]);
    march.date = at(2025, 3, 2);
    let mut last_year = expense("e3", None, "u1", &[("u1", 9999)]);
    last_year.date = at(2024, 12, 31);
    for e in [january, march, last_year] {
        store.insert_expense(e).await.unwrap();
    }

    assert_eq!(service.total_spent("u1", 2025).await.unwrap(), cents(1900));

    let monthly = service.monthly_spending("u1", 2025).await.unwrap();
    assert_eq!(monthly.len(), 12);
    assert_eq!(monthly[0].month, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(monthly[0].total, cents(1500));
    assert_eq!(monthly[1].total, Amount::ZERO);
    assert_eq!(monthly[2].total, cents(400));
    assert!(monthly.windows(2).all(|w| w[0].month < w[1].month));
}

#[tokio::test]
async fn invite_tokens_are_admin_only_and_joinable() {
    let (store, service) = trip_with_even_split().await;
    store.insert_user(user("u4")).await.unwrap();

    let err = service.generate_invite_token("g1", "u2").await.unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
    let err = service.generate_invite_token("nope", "u1").await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let token = service.generate_invite_token("g1", "u1").await.unwrap();
    assert_eq!(token.len(), 10);

    assert_eq!(service.join_group_by_token(&token, "u4").await.unwrap(), "g1");
    assert_eq!(service.join_group_by_token(&token, "u4").await.unwrap(), "g1");
    let group = store.get_group("g1").await.unwrap().unwrap();
    assert_eq!(group.members.len(), 4);
    assert_eq!(group.membership("u4").unwrap().role, Role::Member);

    let rotated = service.generate_invite_token("g1", "u1").await.unwrap();
    let err = service.join_group_by_token(&token, "u5").await;
    assert!(token == rotated || matches!(err, Err(LedgerError::InvalidState(_))));

    let err = service.join_group_by_token("not-a-token", "u4").await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
}

#[tokio::test]
async fn writers_validate_and_feed_the_ledger() {
    let (_, service) = seeded(&["u1", "u2", "u3", "u9"]).await;
    let group = service
        .create_group(
            "u1",
            NewGroup {
                name: "Flat".to_string(),
                description: String::new(),
                members: vec!["u2".to_string(), "u1".to_string(), "u3".to_string()],
            },
        )
        .await
        .unwrap();
    assert_eq!(group.members.len(), 3);
    assert!(group.is_admin("u1"));

    let split = |user: &str, amount| Split {
        user_id: user.to_string(),
        amount: cents(amount),
        paid: false,
    };
    let rent = NewExpense {
        group_id: Some(group.id.clone()),
        paid_by_user_id: "u1".to_string(),
        date: None,
        amount: cents(9000),
        description: "rent".to_string(),
        splits: vec![split("u1", 3000), split("u2", 3000), split("u3", 3000)],
    };

    let err = service.add_expense("u9", rent.clone()).await.unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    let mut outsider_split = rent.clone();
    outsider_split.splits[2] = split("u9", 3000);
    let err = service.add_expense("u1", outsider_split).await.unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    let mut short = rent.clone();
    short.amount = cents(8999);
    let err = service.add_expense("u1", short).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    service.add_expense("u2", rent).await.unwrap();

    let self_payment = NewSettlement {
        group_id: Some(group.id.clone()),
        paid_by_user_id: "u2".to_string(),
        received_by_user_id: "u2".to_string(),
        amount: cents(100),
        date: None,
        note: None,
    };
    let err = service.add_settlement("u2", self_payment.clone()).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    let payment = NewSettlement {
        received_by_user_id: "u1".to_string(),
        amount: cents(3000),
        note: Some("rent".to_string()),
        ..self_payment
    };
    service.add_settlement("u2", payment).await.unwrap();

    let view = service.group_ledger(&group.id, "u3").await.unwrap();
    let u2 = view.balances.iter().find(|b| b.member.id == "u2").unwrap();
    assert!(u2.owes.is_empty());
    assert_eq!(u2.total_balance, Amount::ZERO);
    let u1 = view.balances.iter().find(|b| b.member.id == "u1").unwrap();
    assert_eq!(u1.total_balance, cents(3000));
}

#[tokio::test]
async fn direct_writes_must_involve_the_requester() {
    let (_, service) = seeded(&["u1", "u2", "u3"]).await;
    let lunch = NewExpense {
        group_id: None,
        paid_by_user_id: "u1".to_string(),
        date: None,
        amount: cents(1000),
        description: "lunch".to_string(),
        splits: vec![Split {
            user_id: "u2".to_string(),
            amount: cents(1000),
            paid: false,
        }],
    };
    let err = service.add_expense("u3", lunch.clone()).await.unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
    service.add_expense("u2", lunch).await.unwrap();

    let view = service.user_balances("u2").await.unwrap();
    assert_eq!(view.you_owe, cents(1000));
    assert_eq!(view.owe_details.you_owe[0].user_id, "u1");
}

#[tokio::test]
async fn split_sums_near_the_limit() {
    let (store, service) = seeded(&["u1", "u2", "u3"]).await;
    let split = |user: &str, amount| Split {
        user_id: user.to_string(),
        amount: cents(amount),
        paid: false,
    };
    let wrapping = NewExpense {
        group_id: None,
        paid_by_user_id: "u1".to_string(),
        date: None,
        amount: Amount::ZERO,
        description: "wraps around".to_string(),
        splits: vec![split("u1", i64::MAX), split("u2", i64::MAX), split("u3", 2)],
    };
    let err = service.add_expense("u1", wrapping.clone()).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));
    assert!(store.direct_expenses_for_user("u1").await.unwrap().is_empty());

    let huge = NewExpense {
        amount: cents(i64::MAX),
        description: "huge".to_string(),
        splits: vec![split("u2", i64::MAX)],
        ..wrapping
    };
    service.add_expense("u1", huge).await.unwrap();
    let view = service.user_balances("u2").await.unwrap();
    assert_eq!(view.you_owe, cents(i64::MAX));
}

#[tokio::test]
async fn outstanding_debts_merge_direct_and_group_debts() {
    let (store, service) = trip_with_even_split().await;
    store
        .insert_expense(expense("e2", None, "u1", &[("u2", 500)]))
        .await
        .unwrap();
    store
        .insert_settlement(settlement("s1", Some("g1"), "u3", "u1", 2000))
        .await
        .unwrap();

    let report = service.outstanding_debts().await.unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].user_id, "u2");
    assert_eq!(report[0].email, "u2@example.com");
    assert_eq!(report[0].debts.len(), 1);
    assert_eq!(report[0].debts[0].user_id, "u1");
    assert_eq!(report[0].debts[0].amount, cents(2500));
}
