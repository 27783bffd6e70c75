//! Test doubles shared by the orchestrator suites.

mod engine;
mod environment;
mod mocks;
mod reporter;

pub use engine::{EngineCall, FAKE_PID, FakeEngine};
pub use environment::{FixedPorts, ImmediateSignal, RecordingNetwork};
pub use mocks::{MockEngine, MockImport, MockSession};
pub use reporter::{RecordingReporter, ReportEvent};
