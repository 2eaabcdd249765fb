//! Mirrors a MySQL database into a columnar analytical store.
//!
//! The crate tails the source server's row-based binary log and materializes
//! every table as an append-only columnar table with two trailing columns:
//! a `sign` (+1 for "row exists", -1 for "row cancelled") and a globally
//! monotone `version`. The target store's merge-on-read picks, per sorting
//! key, the row with the highest version and drops keys whose latest sign is
//! negative, which simulates mutable rows over immutable storage.
//!
//! A [`pipeline::Pipeline`] owns one background sync worker per target
//! database. The worker bootstraps by dumping the source tables under a
//! consistent snapshot, then switches to streaming binlog events, batching
//! row writes in per-table buffers that are flushed atomically together with
//! the replication position.

pub mod clients;
pub mod concurrency;
pub mod conversions;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod replication;
pub mod state;
pub mod target;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;

mod macros;
