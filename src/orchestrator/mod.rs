mod orchestrator;
mod progress;

pub use orchestrator::{DirectoryFailure, Orchestrator, OrchestratorError, RunOutcome};
pub use progress::Progress;
