//! SQLite store - connection management, schema, and the locked import
//! transaction.
//!
//! Writers use immediate transactions so SQLite takes the write lock up
//! front; on top of that, imports hold an in-process advisory lock over
//! their date span so two imports with overlapping ranges are fully
//! serialized while disjoint ranges proceed concurrently.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Condvar, Mutex, OnceLock};
use std::time::Duration;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info};

use super::models::{CreateParams, DuplicateKey, LedgerTransaction, ListFilter};
use crate::error::Result;

/// Get the default database path (~/.contas/ledger.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let contas_dir = PathBuf::from(home).join(".contas");

    std::fs::create_dir_all(&contas_dir).context("failed to create .contas directory")?;

    Ok(contas_dir.join("ledger.db"))
}

/// Open a database connection.
///
/// The busy timeout bounds how long a blocked writer waits on the SQLite
/// file lock; an import that cannot make progress within it aborts and
/// rolls back.
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };

    let conn = Connection::open(&path)
        .with_context(|| format!("failed to open database at {path:?}"))?;
    conn.busy_timeout(Duration::from_secs(5))
        .context("failed to set busy timeout")?;

    Ok(conn)
}

/// Initialize the database with the ledger schema.
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = match db_path {
        Some(p) => p,
        None => get_default_db_path()?,
    };

    info!("initializing ledger database at {:?}", path);

    let conn = open_db(Some(path))?;
    conn.execute_batch(include_str!("schema.sql"))
        .context("failed to execute schema")?;

    Ok(())
}

/// In-process advisory lock over date ranges.
///
/// `acquire` blocks while any held range overlaps the requested one, so two
/// imports racing on overlapping spans are totally ordered by acquisition;
/// disjoint spans never wait on each other. The lock is a coordination token
/// only, not a data lock, and is released when its guard drops.
struct RangeLocks {
    held: Mutex<Vec<(NaiveDate, NaiveDate)>>,
    released: Condvar,
}

impl RangeLocks {
    fn acquire(&'static self, min_date: NaiveDate, max_date: NaiveDate) -> RangeLockGuard {
        let mut held = self.held.lock().expect("range lock poisoned");

        while held
            .iter()
            .any(|&(lo, hi)| lo <= max_date && min_date <= hi)
        {
            held = self.released.wait(held).expect("range lock poisoned");
        }

        held.push((min_date, max_date));

        RangeLockGuard {
            locks: self,
            range: (min_date, max_date),
        }
    }
}

struct RangeLockGuard {
    locks: &'static RangeLocks,
    range: (NaiveDate, NaiveDate),
}

impl Drop for RangeLockGuard {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock().expect("range lock poisoned");
        if let Some(pos) = held.iter().position(|r| *r == self.range) {
            held.remove(pos);
        }

        self.locks.released.notify_all();
    }
}

fn import_locks() -> &'static RangeLocks {
    static LOCKS: OnceLock<RangeLocks> = OnceLock::new();
    LOCKS.get_or_init(|| RangeLocks {
        held: Mutex::new(Vec::new()),
        released: Condvar::new(),
    })
}

/// One import attempt: a database transaction plus the advisory lock over
/// the batch's inclusive date span. Dropping without commit rolls the
/// transaction back and releases the lock, in that order.
pub struct ImportTx<'conn> {
    tx: rusqlite::Transaction<'conn>,
    min_date: NaiveDate,
    max_date: NaiveDate,
    _lock: RangeLockGuard,
}

/// Begin an import over [min_date, max_date]. Blocks until no overlapping
/// import is in flight.
pub fn begin_import(
    conn: &mut Connection,
    min_date: NaiveDate,
    max_date: NaiveDate,
) -> Result<ImportTx<'_>> {
    debug!(%min_date, %max_date, "acquiring import range lock");
    let lock = import_locks().acquire(min_date, max_date);

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("beginning import transaction")?;

    Ok(ImportTx {
        tx,
        min_date,
        max_date,
        _lock: lock,
    })
}

const SELECT_COLUMNS: &str = "id, amount_cents, direction, status, description, \
     raw_description, date, invoice_url, created_at, updated_at, deleted_at";

fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<LedgerTransaction> {
    Ok(LedgerTransaction {
        id: Some(row.get(0)?),
        amount_cents: row.get(1)?,
        direction: parse_column(row, 2, "direction")?,
        status: parse_column(row, 3, "status")?,
        description: row.get(4)?,
        raw_description: row.get(5)?,
        date: row.get(6)?,
        invoice_url: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        deleted_at: row.get(10)?,
    })
}

/// Read a TEXT column through its FromStr impl, mapping unknown values to a
/// column type error instead of defaulting.
fn parse_column<T: std::str::FromStr>(
    row: &rusqlite::Row,
    idx: usize,
    name: &str,
) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, name.to_string(), rusqlite::types::Type::Text)
    })
}

impl ImportTx<'_> {
    /// All non-deleted rows inside the locked span whose duplicate key
    /// matches an incoming row.
    pub fn find_duplicates(&self, batch: &[CreateParams]) -> Result<Vec<LedgerTransaction>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let keys: HashSet<DuplicateKey> = batch.iter().map(DuplicateKey::of_params).collect();

        let mut stmt = self
            .tx
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM transactions
                 WHERE deleted_at IS NULL AND date >= ?1 AND date <= ?2
                 ORDER BY date ASC"
            ))
            .context("preparing duplicate query")?;

        let existing = stmt
            .query_map(
                rusqlite::params![self.min_date, self.max_date],
                row_to_transaction,
            )
            .context("finding duplicates")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("scanning transactions")?;

        Ok(existing
            .into_iter()
            .filter(|tx| keys.contains(&DuplicateKey::of_transaction(tx)))
            .collect())
    }

    /// Insert the batch as ledger transactions; returns them with identities
    /// and timestamps assigned.
    pub fn create_transactions(&self, batch: &[CreateParams]) -> Result<Vec<LedgerTransaction>> {
        let mut stmt = self
            .tx
            .prepare(
                "INSERT INTO transactions
                     (amount_cents, direction, status, description, raw_description, date, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .context("preparing insert")?;

        let mut created = Vec::with_capacity(batch.len());

        for p in batch {
            let now = Utc::now();

            stmt.execute(rusqlite::params![
                p.amount_cents,
                p.direction.as_str(),
                p.status.as_str(),
                p.description,
                p.raw_description,
                p.date,
                now,
            ])
            .context("creating transaction")?;

            created.push(LedgerTransaction {
                id: Some(self.tx.last_insert_rowid()),
                amount_cents: p.amount_cents,
                direction: p.direction,
                status: p.status,
                description: p.description.clone(),
                raw_description: p.raw_description.clone(),
                date: p.date,
                invoice_url: None,
                created_at: now,
                updated_at: None,
                deleted_at: None,
            });
        }

        Ok(created)
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit().context("committing import transaction")?;
        Ok(())
    }
}

/// List non-deleted ledger transactions, date ascending. Read side used by
/// the CLI and by collaborators; imports never go through here.
pub fn list_transactions(
    conn: &Connection,
    filter: &ListFilter,
) -> Result<Vec<LedgerTransaction>> {
    let mut sql =
        format!("SELECT {SELECT_COLUMNS} FROM transactions WHERE deleted_at IS NULL");
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(status) = filter.status {
        sql.push_str(" AND status = ?");
        args.push(Box::new(status.as_str()));
    }
    if let Some(start) = filter.start_date {
        sql.push_str(" AND date >= ?");
        args.push(Box::new(start));
    }
    if let Some(end) = filter.end_date {
        sql.push_str(" AND date <= ?");
        args.push(Box::new(end));
    }

    sql.push_str(" ORDER BY date ASC");

    let mut stmt = conn.prepare(&sql).context("preparing list query")?;
    let arg_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|a| a.as_ref()).collect();

    let txs = stmt
        .query_map(arg_refs.as_slice(), row_to_transaction)
        .context("listing transactions")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("scanning transactions")?;

    Ok(txs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::{Direction, Status};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        init_database(Some(path.clone())).unwrap();
        (dir, open_db(Some(path)).unwrap())
    }

    fn params(date: NaiveDate, desc: &str, cents: i64) -> CreateParams {
        CreateParams {
            amount_cents: cents,
            direction: Direction::Expense,
            status: Status::Draft,
            description: desc.to_string(),
            raw_description: desc.to_string(),
            date,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn test_init_database_creates_schema() {
        let (_dir, conn) = test_db();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='transactions'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_insert_commit_and_list_round_trip() {
        let (_dir, mut conn) = test_db();

        let batch = vec![params(day(9), "TFI Wise", 860852), params(day(30), "TSU", 58874)];
        let itx = begin_import(&mut conn, day(9), day(30)).unwrap();
        let created = itx.create_transactions(&batch).unwrap();
        itx.commit().unwrap();

        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|tx| tx.id.is_some()));

        let listed = list_transactions(&conn, &ListFilter::default()).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].raw_description, "TFI Wise");
        assert_eq!(listed[1].raw_description, "TSU");
    }

    #[test]
    fn test_dropped_import_tx_rolls_back() {
        let (_dir, mut conn) = test_db();

        {
            let itx = begin_import(&mut conn, day(1), day(1)).unwrap();
            itx.create_transactions(&[params(day(1), "DISCARDED", 100)])
                .unwrap();
            // No commit.
        }

        let listed = list_transactions(&conn, &ListFilter::default()).unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn test_find_duplicates_matches_on_key_only() {
        let (_dir, mut conn) = test_db();

        let existing = params(day(10), "RENT", 90000);
        let itx = begin_import(&mut conn, day(10), day(10)).unwrap();
        itx.create_transactions(&[existing.clone()]).unwrap();
        itx.commit().unwrap();

        let mut same_key = existing.clone();
        same_key.description = "edited later".to_string();

        let mut other_amount = existing.clone();
        other_amount.amount_cents = 90001;

        let itx = begin_import(&mut conn, day(10), day(10)).unwrap();
        let dups = itx.find_duplicates(&[same_key, other_amount]).unwrap();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].raw_description, "RENT");
    }

    #[test]
    fn test_find_duplicates_ignores_soft_deleted_rows() {
        let (_dir, mut conn) = test_db();

        let p = params(day(10), "RENT", 90000);
        let itx = begin_import(&mut conn, day(10), day(10)).unwrap();
        itx.create_transactions(&[p.clone()]).unwrap();
        itx.commit().unwrap();

        conn.execute(
            "UPDATE transactions SET deleted_at = ?1",
            rusqlite::params![Utc::now()],
        )
        .unwrap();

        let itx = begin_import(&mut conn, day(10), day(10)).unwrap();
        let dups = itx.find_duplicates(std::slice::from_ref(&p)).unwrap();
        assert!(dups.is_empty());
    }

    #[test]
    fn test_list_filters_by_status_and_date() {
        let (_dir, mut conn) = test_db();

        let batch = vec![params(day(5), "A", 100), params(day(20), "B", 200)];
        let itx = begin_import(&mut conn, day(5), day(20)).unwrap();
        itx.create_transactions(&batch).unwrap();
        itx.commit().unwrap();

        let filter = ListFilter {
            start_date: Some(day(10)),
            ..Default::default()
        };
        let listed = list_transactions(&conn, &filter).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].raw_description, "B");

        let filter = ListFilter {
            status: Some(Status::Complete),
            ..Default::default()
        };
        assert!(list_transactions(&conn, &filter).unwrap().is_empty());
    }
}
