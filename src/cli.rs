use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "contas")]
#[command(version, about = "CGD bank statement importer with a duplicate-safe ledger")]
pub struct Cli {
    /// Path to the ledger database (defaults to ~/.contas/ledger.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the ledger database and schema
    Init,

    /// Import a CGD CSV export (auto-detects the statement layout)
    Import {
        /// Path to the exported CSV file
        file: PathBuf,

        /// Preview only, don't touch the database
        #[arg(short, long)]
        dry_run: bool,

        /// Also commit rows that collide with existing transactions
        #[arg(long)]
        keep_duplicates: bool,
    },

    /// List ledger transactions
    List {
        /// Filter by status (draft, pending_invoice, complete, no_invoice)
        #[arg(long)]
        status: Option<String>,

        /// Only transactions on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Only transactions on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}
