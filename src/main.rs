mod cli;

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use contas::importers::parse_statement;
use contas::ledger::{self, CreateParams, ImportOutcome, ListFilter, Status};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            ledger::init_database(cli.db)?;
            println!("Ledger initialized");
            Ok(())
        }

        Commands::Import {
            file,
            dry_run,
            keep_duplicates,
        } => handle_import(cli.db, &file, dry_run, keep_duplicates, cli.json),

        Commands::List { status, from, to } => handle_list(cli.db, status, from, to, cli.json),
    }
}

fn handle_import(
    db: Option<PathBuf>,
    file: &Path,
    dry_run: bool,
    keep_duplicates: bool,
    json: bool,
) -> Result<()> {
    info!("importing statement from {:?}", file);

    let f = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let batch = parse_statement(f)?;

    println!("Found {} transactions in {}", batch.len(), file.display());

    if dry_run {
        for p in &batch {
            print_params(p);
        }
        println!("Dry run, nothing imported");
        return Ok(());
    }

    let mut conn = ledger::open_db(db)?;

    match ledger::import_batch(&mut conn, &batch)? {
        ImportOutcome::Imported(txs) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&txs)?);
            } else {
                println!("Imported {} transactions", txs.len());
            }
        }

        ImportOutcome::Conflicted { new, conflicts } => {
            println!(
                "Found {} conflicting transactions ({} new), nothing imported:",
                conflicts.len(),
                new.len()
            );
            for c in &conflicts {
                println!(
                    "  {} {:>12} {:<8} {} (matches ledger entry {})",
                    c.incoming.date,
                    format_cents(c.incoming.amount_cents),
                    c.incoming.direction.as_str(),
                    c.incoming.description,
                    c.existing.id.unwrap_or_default(),
                );
            }

            if keep_duplicates {
                let mut approved = new;
                approved.extend(conflicts.into_iter().map(|c| c.incoming));

                let txs = ledger::confirm_batch(&mut conn, &approved)?;
                println!("Imported {} transactions (duplicates kept)", txs.len());
            } else {
                println!("Re-run with --keep-duplicates to import the full batch anyway");
            }
        }
    }

    Ok(())
}

fn handle_list(
    db: Option<PathBuf>,
    status: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let status = status
        .map(|s| {
            s.parse::<Status>()
                .map_err(|_| anyhow!("unknown status: {s}"))
        })
        .transpose()?;

    let conn = ledger::open_db(db)?;
    let filter = ListFilter {
        status,
        start_date: from,
        end_date: to,
    };

    let txs = ledger::list_transactions(&conn, &filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&txs)?);
        return Ok(());
    }

    if txs.is_empty() {
        println!("No transactions found");
        return Ok(());
    }

    for tx in &txs {
        println!(
            "{:>6}  {}  {:>12}  {:<8} {:<15} {}",
            tx.id.unwrap_or_default(),
            tx.date,
            format_cents(tx.amount_cents),
            tx.direction.as_str(),
            tx.status.as_str(),
            tx.description,
        );
    }

    Ok(())
}

fn print_params(p: &CreateParams) {
    println!(
        "  {}  {:>12}  {:<8} {}",
        p.date,
        format_cents(p.amount_cents),
        p.direction.as_str(),
        p.description,
    );
}

fn format_cents(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}
