//! Import engine services.

pub mod assets;
pub mod builder;
pub mod catalog;
pub mod run_log;
pub mod sync;
pub mod telemetry;
