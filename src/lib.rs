//! logrelay: Observability and Log Relay
//!
//! Lets independent parts of a development environment publish status and
//! log events, and lets any number of observers follow them:
//!
//! - [`status::StatusCell`]: observable flags such as "initialization in progress"
//! - [`bus::LogBus`]: live, lossy fan-out of output lines
//! - [`store::LogStore`]: bounded history of structured [`record::LogRecord`]s
//! - [`relay::LogRelay`]: validating ingestion of records from other processes
//!
//! [`context::Observability`] wires them together for one process.

pub mod bus;
pub mod cli;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod record;
pub mod relay;
pub mod status;
pub mod store;
