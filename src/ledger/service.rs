//! Import protocol: duplicate resolution inside a locked transaction, plus
//! the confirm path that commits a caller-approved batch.

use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::{info, warn};

use super::models::{Conflict, CreateParams, DuplicateKey, ImportOutcome, LedgerTransaction};
use super::store;
use crate::error::Result;

/// Import a parsed batch with duplicate detection.
///
/// Opens a transaction locked over the batch's date span, looks up existing
/// rows that collide on the duplicate key, and either commits the whole
/// batch (no collisions) or rolls back and returns the new/conflicting
/// partition for a caller decision. A batch is never partially applied.
pub fn import_batch(conn: &mut Connection, batch: &[CreateParams]) -> Result<ImportOutcome> {
    if batch.is_empty() {
        return Ok(ImportOutcome::Imported(Vec::new()));
    }

    let (min_date, max_date) = date_range(batch);

    let itx = store::begin_import(conn, min_date, max_date).context("begin import")?;

    let duplicates = itx.find_duplicates(batch).context("find duplicates")?;

    let existing_by_key: HashMap<DuplicateKey, LedgerTransaction> = duplicates
        .into_iter()
        .map(|tx| (DuplicateKey::of_transaction(&tx), tx))
        .collect();

    let mut new = Vec::new();
    let mut conflicts = Vec::new();

    for p in batch {
        match existing_by_key.get(&DuplicateKey::of_params(p)) {
            Some(existing) => conflicts.push(Conflict {
                incoming: p.clone(),
                existing: existing.clone(),
            }),
            None => new.push(p.clone()),
        }
    }

    if !conflicts.is_empty() {
        warn!(
            conflicts = conflicts.len(),
            new = new.len(),
            "import collided with existing transactions, rolling back"
        );
        // Dropping the transaction rolls it back; nothing was applied.
        drop(itx);

        return Ok(ImportOutcome::Conflicted { new, conflicts });
    }

    let imported = itx.create_transactions(&new).context("create transactions")?;
    itx.commit().context("commit import")?;

    info!(imported = imported.len(), "import committed");

    Ok(ImportOutcome::Imported(imported))
}

/// Commit a caller-approved batch with no further duplicate search.
///
/// Used after a conflicted import once the caller has decided which rows to
/// keep; the batch is trusted as resolved.
pub fn confirm_batch(
    conn: &mut Connection,
    batch: &[CreateParams],
) -> Result<Vec<LedgerTransaction>> {
    if batch.is_empty() {
        return Ok(Vec::new());
    }

    let (min_date, max_date) = date_range(batch);

    let itx = store::begin_import(conn, min_date, max_date).context("begin import")?;
    let imported = itx.create_transactions(batch).context("create transactions")?;
    itx.commit().context("commit import")?;

    info!(imported = imported.len(), "confirmed batch committed");

    Ok(imported)
}

/// Inclusive [min, max] date span of a non-empty batch.
fn date_range(batch: &[CreateParams]) -> (NaiveDate, NaiveDate) {
    let mut min_date = batch[0].date;
    let mut max_date = batch[0].date;

    for p in &batch[1..] {
        if p.date < min_date {
            min_date = p.date;
        }
        if p.date > max_date {
            max_date = p.date;
        }
    }

    (min_date, max_date)
}
