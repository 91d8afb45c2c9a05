//! Signed contributions of single records to a two-party relationship.
//!
//! Every balance in the crate is built out of [`Debt`]s: an unpaid split is a
//! debt from the participant to the payer, and a settlement is a negative debt
//! from the payer to the receiver.
use crate::money::Amount;
use crate::schemas::{Expense, Settlement, Split};

/// `debtor` owes `creditor` `amount`. A negative amount is a credit that
/// reduces the same-direction debt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Debt<'a> {
    pub debtor: &'a str,
    pub creditor: &'a str,
    pub amount: Amount,
}

impl Debt<'_> {
    pub fn is_self_debt(&self) -> bool {
        self.debtor == self.creditor
    }
}

/// The debt an expense split creates, if any.
///
/// The payer's own split and splits already marked paid contribute nothing.
pub fn split_debt<'a>(expense: &'a Expense, split: &'a Split) -> Option<Debt<'a>> {
    if split.paid || split.user_id == expense.paid_by_user_id {
        return None;
    }
    Some(Debt {
        debtor: &split.user_id,
        creditor: &expense.paid_by_user_id,
        amount: split.amount,
    })
}

/// All debts an expense creates, in split order.
pub fn expense_debts(expense: &Expense) -> impl Iterator<Item = Debt<'_>> {
    expense
        .splits
        .iter()
        .filter_map(move |split| split_debt(expense, split))
}

/// The credit a settlement applies: what the payer owes the receiver goes
/// down by the settled amount.
pub fn settlement_credit(settlement: &Settlement) -> Debt<'_> {
    Debt {
        debtor: &settlement.paid_by_user_id,
        creditor: &settlement.received_by_user_id,
        amount: -settlement.amount,
    }
}
