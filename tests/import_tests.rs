//! End-to-end import tests.
//!
//! These cover the whole pipeline: statement bytes to parsed params to the
//! duplicate-checked import transaction, including the concurrent-import
//! ordering guarantee.

use anyhow::Result;
use chrono::NaiveDate;
use contas::importers::parse_statement;
use contas::ledger::{
    confirm_batch, import_batch, init_database, list_transactions, open_db, CreateParams,
    Direction, ImportOutcome, ListFilter, Status,
};
use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

const CONTA_STATEMENT: &str = "\
Consultar saldos e movimentos à ordem - 31-01-2026;\"=\"\"0000\"\"\"
Nome cliente;JOHN DOE

Dados da conta
Saldo contabilístico;1.000,00 EUR

Data mov.;Data-valor;Descrição;Montante;Saldo contabilístico após movimento
30-01-2026;30-01-2026;INSTITUTO GESTAO FINA;-588,74;48.825,46
09-01-2026;09-01-2026;TFI Wise;8.608,52;52.532,78
";

/// Test helper: create a temporary ledger database.
fn create_test_db() -> Result<(TempDir, PathBuf, Connection)> {
    let dir = TempDir::new()?;
    let path = dir.path().join("ledger.db");
    init_database(Some(path.clone()))?;
    let conn = open_db(Some(path.clone()))?;
    Ok((dir, path, conn))
}

fn day(month: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, d).unwrap()
}

fn draft(date: NaiveDate, desc: &str, cents: i64, direction: Direction) -> CreateParams {
    CreateParams {
        amount_cents: cents,
        direction,
        status: Status::Draft,
        description: desc.to_string(),
        raw_description: desc.to_string(),
        date,
    }
}

#[test]
fn parse_then_import_commits_all_rows() -> Result<()> {
    let (_dir, _path, mut conn) = create_test_db()?;

    let batch = parse_statement(CONTA_STATEMENT.as_bytes())?;
    assert_eq!(batch.len(), 2);

    let outcome = import_batch(&mut conn, &batch)?;
    let imported = match outcome {
        ImportOutcome::Imported(txs) => txs,
        ImportOutcome::Conflicted { .. } => panic!("fresh ledger must not conflict"),
    };

    assert_eq!(imported.len(), 2);
    assert!(imported.iter().all(|tx| tx.status == Status::Draft));

    let listed = list_transactions(&conn, &ListFilter::default())?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].date, day(1, 9));
    assert_eq!(listed[0].direction, Direction::Income);
    assert_eq!(listed[1].amount_cents, 58874);
    Ok(())
}

#[test]
fn reimporting_the_same_statement_conflicts_fully() -> Result<()> {
    let (_dir, _path, mut conn) = create_test_db()?;

    let batch = parse_statement(CONTA_STATEMENT.as_bytes())?;
    assert!(matches!(
        import_batch(&mut conn, &batch)?,
        ImportOutcome::Imported(_)
    ));

    // Second import of the identical statement: every row collides, nothing
    // is written, and the partition carries zero new rows.
    match import_batch(&mut conn, &batch)? {
        ImportOutcome::Conflicted { new, conflicts } => {
            assert!(new.is_empty());
            assert_eq!(conflicts.len(), 2);
            for c in &conflicts {
                assert_eq!(c.incoming.raw_description, c.existing.raw_description);
                assert!(c.existing.id.is_some());
            }
        }
        ImportOutcome::Imported(_) => panic!("duplicate statement must conflict"),
    }

    let listed = list_transactions(&conn, &ListFilter::default())?;
    assert_eq!(listed.len(), 2, "conflicted import must not write rows");
    Ok(())
}

#[test]
fn partial_overlap_rolls_back_the_whole_batch() -> Result<()> {
    let (_dir, _path, mut conn) = create_test_db()?;

    let first = vec![draft(day(1, 10), "RENT", 90000, Direction::Expense)];
    assert!(matches!(
        import_batch(&mut conn, &first)?,
        ImportOutcome::Imported(_)
    ));

    let second = vec![
        draft(day(1, 10), "RENT", 90000, Direction::Expense),
        draft(day(1, 12), "GROCERIES", 4532, Direction::Expense),
    ];

    match import_batch(&mut conn, &second)? {
        ImportOutcome::Conflicted { new, conflicts } => {
            assert_eq!(new.len(), 1);
            assert_eq!(new[0].raw_description, "GROCERIES");
            assert_eq!(conflicts.len(), 1);
        }
        ImportOutcome::Imported(_) => panic!("overlapping row must conflict"),
    }

    // The non-conflicting row must not have been inserted either.
    let listed = list_transactions(&conn, &ListFilter::default())?;
    assert_eq!(listed.len(), 1);
    Ok(())
}

#[test]
fn disjoint_batches_import_cleanly() -> Result<()> {
    let (_dir, _path, mut conn) = create_test_db()?;

    let january = vec![draft(day(1, 10), "RENT", 90000, Direction::Expense)];
    let february = vec![draft(day(2, 10), "RENT", 90000, Direction::Expense)];

    assert!(matches!(
        import_batch(&mut conn, &january)?,
        ImportOutcome::Imported(_)
    ));
    assert!(matches!(
        import_batch(&mut conn, &february)?,
        ImportOutcome::Imported(_)
    ));

    let listed = list_transactions(&conn, &ListFilter::default())?;
    assert_eq!(listed.len(), 2);
    Ok(())
}

#[test]
fn confirm_batch_trusts_the_caller_and_skips_dedup() -> Result<()> {
    let (_dir, _path, mut conn) = create_test_db()?;

    let batch = vec![draft(day(1, 10), "RENT", 90000, Direction::Expense)];
    assert!(matches!(
        import_batch(&mut conn, &batch)?,
        ImportOutcome::Imported(_)
    ));

    // The caller decided to keep the colliding row anyway.
    let imported = confirm_batch(&mut conn, &batch)?;
    assert_eq!(imported.len(), 1);

    let listed = list_transactions(&conn, &ListFilter::default())?;
    assert_eq!(listed.len(), 2, "confirm path must insert unconditionally");
    Ok(())
}

#[test]
fn direction_is_part_of_the_duplicate_key() -> Result<()> {
    let (_dir, _path, mut conn) = create_test_db()?;

    let expense = vec![draft(day(1, 10), "WISE", 5000, Direction::Expense)];
    let income = vec![draft(day(1, 10), "WISE", 5000, Direction::Income)];

    assert!(matches!(
        import_batch(&mut conn, &expense)?,
        ImportOutcome::Imported(_)
    ));
    assert!(matches!(
        import_batch(&mut conn, &income)?,
        ImportOutcome::Imported(_)
    ));
    Ok(())
}

#[test]
fn concurrent_overlapping_imports_never_double_insert() -> Result<()> {
    let (_dir, path, _conn) = create_test_db()?;

    let batch = vec![
        draft(day(1, 9), "TFI Wise", 860852, Direction::Income),
        draft(day(1, 30), "INSTITUTO GESTAO FINA", 58874, Direction::Expense),
    ];

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            let batch = batch.clone();
            std::thread::spawn(move || -> Result<ImportOutcome> {
                let mut conn = open_db(Some(path))?;
                import_batch(&mut conn, &batch)
            })
        })
        .collect();

    let outcomes: Vec<ImportOutcome> = handles
        .into_iter()
        .map(|h| h.join().expect("import thread panicked"))
        .collect::<Result<_>>()?;

    let imported = outcomes
        .iter()
        .filter(|o| matches!(o, ImportOutcome::Imported(_)))
        .count();
    let conflicted = outcomes
        .iter()
        .filter(|o| matches!(o, ImportOutcome::Conflicted { .. }))
        .count();

    // The range lock totally orders the two imports: the loser sees the
    // winner's rows as conflicts, never a second insert.
    assert_eq!(imported, 1);
    assert_eq!(conflicted, 1);

    if let Some(ImportOutcome::Conflicted { new, conflicts }) = outcomes
        .iter()
        .find(|o| matches!(o, ImportOutcome::Conflicted { .. }))
    {
        assert!(new.is_empty());
        assert_eq!(conflicts.len(), 2);
    }

    let conn = open_db(Some(path))?;
    let listed = list_transactions(&conn, &ListFilter::default())?;
    assert_eq!(listed.len(), 2, "each statement line committed exactly once");
    Ok(())
}

#[test]
fn concurrent_disjoint_imports_both_succeed() -> Result<()> {
    let (_dir, path, _conn) = create_test_db()?;

    let handles: Vec<_> = [1u32, 2u32]
        .into_iter()
        .map(|month| {
            let path = path.clone();
            std::thread::spawn(move || -> Result<ImportOutcome> {
                let batch = vec![draft(day(month, 10), "RENT", 90000, Direction::Expense)];
                let mut conn = open_db(Some(path))?;
                import_batch(&mut conn, &batch)
            })
        })
        .collect();

    for h in handles {
        let outcome = h.join().expect("import thread panicked")?;
        assert!(matches!(outcome, ImportOutcome::Imported(_)));
    }

    let conn = open_db(Some(path))?;
    assert_eq!(list_transactions(&conn, &ListFilter::default())?.len(), 2);
    Ok(())
}
