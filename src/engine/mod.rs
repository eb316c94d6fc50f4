//! Discharge engine module.
//!
//! Finding model, aggregation, the decision cascade, check execution and
//! the coordinator that drives them.

pub mod aggregator;
pub mod coordinator;
pub mod decision;
pub mod finding;
pub mod runner;
