//! Job Orchestrator: four named periodic sweeps run with a single-flight
//! invariant, backed by leased advisory locks for cross-process exclusion
//! and cooperative cancellation for long-running work.

pub mod locks;
pub mod scheduler;
pub mod sweeps;
pub mod types;

pub use locks::{LeaseError, LeaseManager};
pub use scheduler::{CancelSignal, JobOrchestrator, Sweep};
pub use sweeps::{AccessAuditorSweep, CachePrunerSweep, LiquidityAnalyzerSweep, LiquiditySource, VelocityCalculatorSweep};
pub use types::{JobLease, JobName, JobState, JobStatus};
