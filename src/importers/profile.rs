//! Registry of known CGD CSV column layouts.
//!
//! Each export format the bank produces is described by a [`Profile`]:
//! which header names denote the date and description columns, and whether
//! the amount is one signed column or a debit/credit pair. Supporting a new
//! format is just adding an entry to [`PROFILES`].

use std::collections::HashMap;

/// How amounts are laid out in a statement row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountMode {
    /// One signed column, e.g. "Montante" holding "-10,00".
    Single { amount_col: &'static str },
    /// Separate debit and credit columns, e.g. "Débito"/"Crédito".
    Split {
        debit_col: &'static str,
        credit_col: &'static str,
    },
}

/// Column layout of one recognized CGD export format.
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    pub name: &'static str,
    pub date_col: &'static str,
    pub desc_col: &'static str,
    pub mode: AmountMode,
}

impl Profile {
    /// Column names that must all be present for this profile to match.
    pub fn required_cols(&self) -> Vec<&'static str> {
        let mut cols = vec![self.date_col, self.desc_col];

        match self.mode {
            AmountMode::Single { amount_col } => cols.push(amount_col),
            AmountMode::Split {
                debit_col,
                credit_col,
            } => {
                cols.push(debit_col);
                cols.push(credit_col);
            }
        }

        cols
    }

    /// Check whether a header row (trimmed name -> column index) satisfies
    /// this profile. Matching is exact and case-sensitive.
    pub fn matches(&self, cols: &HashMap<String, usize>) -> bool {
        self.required_cols()
            .iter()
            .all(|name| cols.contains_key(*name))
    }
}

/// Ordered list of export formats tried during auto-detection.
/// More specific profiles come first to avoid false matches.
pub const PROFILES: &[Profile] = &[
    Profile {
        name: "cartao",
        date_col: "Data",
        desc_col: "Descrição",
        mode: AmountMode::Split {
            debit_col: "Débito",
            credit_col: "Crédito",
        },
    },
    Profile {
        name: "extrato",
        date_col: "Data mov.",
        desc_col: "Descrição",
        mode: AmountMode::Single {
            amount_col: "Movimento",
        },
    },
    Profile {
        name: "conta",
        date_col: "Data mov.",
        desc_col: "Descrição",
        mode: AmountMode::Single {
            amount_col: "Montante",
        },
    },
];
