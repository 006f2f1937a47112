pub mod commands;
pub mod orchestrator;
mod types;

pub use orchestrator::run_invocation;
pub use types::{InvocationEvent, RunReport, Step, StepReport, StepStatus, Stream};
