//! Hash-chained audit ledger.

mod ledger;

pub use ledger::*;
