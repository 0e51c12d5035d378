//! CGD statement parser.
//!
//! Tokenizes decoded CSV text, scans for a header row matching a registered
//! profile, and normalizes the data rows that follow into transaction create
//! params. Real exports open with free-form preamble (client name, balances,
//! query metadata) and close with footer rows; the header scan and the
//! per-row date check absorb both.

use std::collections::HashMap;
use std::io::Read;

use anyhow::Context;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};

use super::amount::parse_european_amount;
use super::profile::{AmountMode, Profile, PROFILES};
use crate::encoding::read_to_utf8;
use crate::error::{ImportError, Result};
use crate::ledger::{CreateParams, Direction, Status};

/// CGD exports use day-month-year with dash separators.
const DATE_FORMAT: &str = "%d-%m-%Y";

/// Parse a CGD CSV export into transaction create params.
///
/// The byte source may be in any encoding the normalizer understands. Rows
/// without a parseable date are skipped (footers, summaries); a date-valid
/// row with an empty description aborts the whole parse.
pub fn parse_statement<R: Read>(r: R) -> Result<Vec<CreateParams>> {
    let text = read_to_utf8(r).context("detect encoding")?;

    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let rows: Vec<StringRecord> = reader
        .records()
        .collect::<std::result::Result<_, _>>()
        .context("read csv")?;

    let (profile, cols, header_idx) =
        detect_profile(&rows).ok_or(ImportError::NoMatchingProfile)?;

    info!(
        profile = profile.name,
        header_row = header_idx + 1,
        "matched statement profile"
    );

    parse_rows(profile, &cols, &rows[header_idx + 1..], header_idx)
}

/// Maps trimmed header text to its column index.
type ColIndex = HashMap<String, usize>;

/// Scan rows in order for a header matching a registered profile.
///
/// Returns the matched profile, the column index map, and the header's row
/// offset. Preamble rows simply fail to match every profile and are passed
/// over; an export in an unknown layout matches nothing.
fn detect_profile(rows: &[StringRecord]) -> Option<(&'static Profile, ColIndex, usize)> {
    for (row_idx, row) in rows.iter().enumerate() {
        let mut cols = ColIndex::new();

        for (i, cell) in row.iter().enumerate() {
            let name = cell.trim();
            if !name.is_empty() {
                cols.insert(name.to_string(), i);
            }
        }

        for profile in PROFILES {
            if profile.matches(&cols) {
                return Some((profile, cols, row_idx));
            }
        }
    }

    None
}

/// Extract transactions from the data rows after the header. `header_idx` is
/// the 0-based offset of the header row, used to report 1-based file rows.
fn parse_rows(
    profile: &Profile,
    cols: &ColIndex,
    rows: &[StringRecord],
    header_idx: usize,
) -> Result<Vec<CreateParams>> {
    let date_idx = cols[profile.date_col];
    let desc_idx = cols[profile.desc_col];

    let mut batch = Vec::new();
    let mut skipped = 0usize;

    for (i, row) in rows.iter().enumerate() {
        let row_num = header_idx + i + 2;

        // No parseable date means footer or summary, not a transaction row.
        let Some(date) = parse_date(row, date_idx) else {
            skipped += 1;
            continue;
        };

        let desc = cell_value(row, desc_idx);
        if desc.is_empty() {
            return Err(ImportError::MissingDescription { row: row_num }.into());
        }

        let Some((amount_cents, direction)) = resolve_amount(profile, cols, row) else {
            skipped += 1;
            continue;
        };

        batch.push(CreateParams {
            amount_cents,
            direction,
            status: Status::Draft,
            description: desc.to_string(),
            raw_description: desc.to_string(),
            date,
        });
    }

    debug!(parsed = batch.len(), skipped, "normalized statement rows");
    Ok(batch)
}

fn parse_date(row: &StringRecord, idx: usize) -> Option<NaiveDate> {
    let s = cell_value(row, idx);
    if s.is_empty() {
        return None;
    }

    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// Resolve amount and direction according to the profile's amount mode.
/// `None` means the row carries no usable amount and is skipped by the caller.
fn resolve_amount(
    profile: &Profile,
    cols: &ColIndex,
    row: &StringRecord,
) -> Option<(i64, Direction)> {
    match profile.mode {
        AmountMode::Single { amount_col } => parse_single_amount(row, cols[amount_col]),
        AmountMode::Split {
            debit_col,
            credit_col,
        } => parse_split_amount(row, cols[debit_col], cols[credit_col]),
    }
}

/// One signed column: negative is an expense, positive an income. Zero and
/// unparseable values mark non-transaction rows.
fn parse_single_amount(row: &StringRecord, idx: usize) -> Option<(i64, Direction)> {
    let s = cell_value(row, idx);
    if s.is_empty() {
        return None;
    }

    match parse_european_amount(s).ok()? {
        0 => None,
        cents if cents < 0 => Some((-cents, Direction::Expense)),
        cents => Some((cents, Direction::Income)),
    }
}

/// Separate debit/credit columns; the debit side is tried first. These
/// exports mark the unused side with an empty cell, so an empty or
/// zero-parsing cell means "no amount here", not a zero-value movement.
fn parse_split_amount(
    row: &StringRecord,
    debit_idx: usize,
    credit_idx: usize,
) -> Option<(i64, Direction)> {
    let debit = cell_value(row, debit_idx);
    if !debit.is_empty() {
        if let Ok(cents) = parse_european_amount(debit) {
            if cents != 0 {
                return Some((cents.abs(), Direction::Expense));
            }
        }
    }

    let credit = cell_value(row, credit_idx);
    if !credit.is_empty() {
        if let Ok(cents) = parse_european_amount(credit) {
            if cents != 0 {
                return Some((cents.abs(), Direction::Income));
            }
        }
    }

    None
}

/// Trimmed cell value; out-of-range indices read as empty since rows in
/// these exports are frequently ragged.
fn cell_value(row: &StringRecord, idx: usize) -> &str {
    row.get(idx).map(str::trim).unwrap_or("")
}
