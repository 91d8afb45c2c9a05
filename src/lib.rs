//! Shared-expense ledger: who owes whom inside groups and between two people.

pub mod auth;
pub mod balance;
pub mod config;
pub mod error;
pub mod exchange;
pub mod ledger;
pub mod money;
pub mod netting;
pub mod routes;
pub mod schemas;
pub mod service;
pub mod store;
pub mod telemetry;

#[cfg(test)]
mod fixtures;

pub use error::{LedgerError, LedgerResult};
pub use money::Amount;
