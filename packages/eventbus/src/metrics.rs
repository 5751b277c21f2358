//! Event bus metrics.

#[derive(Debug, Clone, Default)]
pub struct BusMetrics {
    pub total_events: u64,
    pub total_errors: u64,
    pub active_listeners: u64,
}
