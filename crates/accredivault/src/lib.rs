//! Control status computation for regulatory compliance checklists.
//!
//! Evidence rules and linked evidence are evaluated per control into a single
//! persisted status, with batch recomputation and dashboard aggregation on top.

pub mod compliance;
pub mod config;
pub mod error;
pub mod telemetry;
