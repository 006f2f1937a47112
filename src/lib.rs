pub mod config;
pub mod database_url;
pub mod exit;
pub mod invocation;
pub mod loader;
pub mod logging;
pub mod signals;
