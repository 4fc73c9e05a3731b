//! Search tests grouped by pipeline stage.

pub mod chain_tests;
pub mod compose_tests;
pub mod matcher_tests;
pub mod query_tests;
