//! Contas - CGD bank statement importer and ledger
//!
//! This library parses CGD CSV exports (conta, extrato and cartão layouts),
//! normalizes them into draft ledger transactions, and imports them into a
//! SQLite ledger with duplicate detection that stays safe under concurrent
//! imports of overlapping date ranges.

pub mod encoding;
pub mod error;
pub mod importers;
pub mod ledger;
