//! Concrete implementations of the four named sweeps.

mod access_auditor;
mod cache_pruner;
mod liquidity_analyzer;
mod velocity_calculator;

pub use access_auditor::AccessAuditorSweep;
pub use cache_pruner::CachePrunerSweep;
pub use liquidity_analyzer::{LiquidityAnalyzerSweep, LiquiditySource};
pub use velocity_calculator::VelocityCalculatorSweep;
