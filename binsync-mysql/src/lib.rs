//! MySQL-facing types and connection utilities for binsync.
//!
//! This crate holds everything that speaks MySQL's dialect without being part
//! of the replication core: table name quoting, binlog positions and events,
//! the untyped row value model, and connection pool construction.

pub mod replication;
pub mod types;
