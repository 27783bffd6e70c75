//! Test suites for the orchestrator.

mod cli_behaviour;
pub(crate) mod support;
