// Statement import module - CGD CSV profiles and parser

pub mod amount;
pub mod parser;
pub mod profile;

pub use parser::parse_statement;
pub use profile::{AmountMode, Profile, PROFILES};
