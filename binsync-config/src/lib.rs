//! Configuration types for binsync replication pipelines.

pub mod shared;
