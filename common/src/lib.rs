// Common library: page monitoring core shared by the scheduler binary and tests

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod errors;
pub mod executor;
pub mod models;
pub mod monitor;
pub mod notifier;
pub mod scheduler;
pub mod storage;
pub mod telemetry;

pub use monitor::Monitor;
