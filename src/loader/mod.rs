// Loader process supervision: spawning, output streaming, timeouts and signal forwarding.

pub mod engine;
pub mod run;
pub mod types;

pub use engine::{SIGTERM, ensure_available};
pub use run::spawn;
pub use types::{CancelToken, LoaderCommand, OutputLine, ProcessResult};
