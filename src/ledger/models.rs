use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Direction of money movement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Income,
    Expense,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Income => "income",
            Direction::Expense => "expense",
        }
    }
}

impl FromStr for Direction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "income" => Ok(Direction::Income),
            "expense" => Ok(Direction::Expense),
            _ => Err(()),
        }
    }
}

/// Lifecycle state of a ledger transaction.
///
/// Imports always create drafts; the invoice collaborators later move a
/// draft to `pending_invoice` and on to `complete`, or park it as
/// `no_invoice`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Draft,
    PendingInvoice,
    Complete,
    NoInvoice,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::PendingInvoice => "pending_invoice",
            Status::Complete => "complete",
            Status::NoInvoice => "no_invoice",
        }
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "draft" => Ok(Status::Draft),
            "pending_invoice" => Ok(Status::PendingInvoice),
            "complete" => Ok(Status::Complete),
            "no_invoice" => Ok(Status::NoInvoice),
            _ => Err(()),
        }
    }
}

/// Normalized intent to create one ledger transaction, produced by the
/// statement parser. The amount is always non-negative; the sign of the
/// original value lives in `direction`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateParams {
    pub amount_cents: i64,
    pub direction: Direction,
    pub status: Status,
    pub description: String,
    pub raw_description: String,
    pub date: NaiveDate,
}

/// Persisted ledger entry. Created by imports, never mutated by them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: Option<i64>,
    pub amount_cents: i64,
    pub direction: Direction,
    pub status: Status,
    pub description: String,
    pub raw_description: String,
    pub date: NaiveDate,
    pub invoice_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Identity used for duplicate detection.
///
/// Deliberately keys on (date, amount, direction, raw description) and
/// nothing else: status and invoice fields are mutable downstream, while the
/// raw description is the stable text the bank exported. Two genuinely
/// distinct transactions on the same day with identical amount and raw text
/// will collide under this key; that tradeoff is inherited and kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    pub date: NaiveDate,
    pub amount_cents: i64,
    pub direction: Direction,
    pub raw_description: String,
}

impl DuplicateKey {
    pub fn of_params(p: &CreateParams) -> Self {
        DuplicateKey {
            date: p.date,
            amount_cents: p.amount_cents,
            direction: p.direction,
            raw_description: p.raw_description.clone(),
        }
    }

    pub fn of_transaction(tx: &LedgerTransaction) -> Self {
        DuplicateKey {
            date: tx.date,
            amount_cents: tx.amount_cents,
            direction: tx.direction,
            raw_description: tx.raw_description.clone(),
        }
    }
}

/// Optional filters for the ledger read side.
#[derive(Debug, Default, Clone)]
pub struct ListFilter {
    pub status: Option<Status>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// An incoming row paired with the existing ledger entry it collided with.
#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub incoming: CreateParams,
    pub existing: LedgerTransaction,
}

/// Outcome of one import attempt.
#[derive(Debug, Serialize)]
pub enum ImportOutcome {
    /// No collisions; every row was committed.
    Imported(Vec<LedgerTransaction>),
    /// Collisions found; nothing was committed. The partition drives a
    /// caller decision before a [`confirm_batch`](super::confirm_batch) call.
    Conflicted {
        new: Vec<CreateParams>,
        conflicts: Vec<Conflict>,
    },
}
