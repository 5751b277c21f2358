//! Epoch-scoped multi-tier cache.
//!
//! L1 is a bounded, process-local map; L2 is an abstraction over a
//! shared backend. Keys embed the owning workspace's `cacheEpoch`, so
//! a structural change that bumps the epoch invalidates every prior
//! entry logically, without an eviction pass.

pub mod cache;
pub mod key;
pub mod pruner;
pub mod tier;

pub use cache::TieredCache;
pub use tier::{InMemoryL2, L1Tier, L2Tier};
