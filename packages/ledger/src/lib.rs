//! Immutable tamper-evident audit ledger.
//!
//! Every mutation recorded here is chained to its predecessor by hash, so
//! the integrity of an entity's full history can be verified without a
//! trusted third party. The ledger is the sole authority on what counts
//! as a recorded event: no other crate in this workspace constructs an
//! [`AuditEntry`].

pub mod audit;

pub use audit::{
    AuditEntry, AuditLedger, ChainStatus, ChainVerification, EventType, LedgerError, Paging,
    QueryFilters,
};
