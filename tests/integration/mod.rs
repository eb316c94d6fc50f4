//! Integration tests for discharge-preflight.
//!
//! These tests drive the decision engine, the coordinator and the binary
//! with scripted checks and temporary patient records.

pub mod cli_tests;
pub mod coordinator_tests;
pub mod full_run_tests;
