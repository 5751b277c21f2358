//! In-process publish/subscribe bus.
//!
//! Subscribers run in registration order with per-listener error
//! isolation: a crashing or erroring subscriber never affects the
//! publisher or its siblings.

pub mod bus;
pub mod metrics;

pub use bus::{Event, EventBus, Listener};
pub use metrics::BusMetrics;
