//! Metric names and registration for the replication core.

use metrics::{describe_counter, describe_histogram};

/// Label identifying the target database a metric belongs to.
pub const DATABASE_LABEL: &str = "database";

/// Label carrying the binlog event type on event counters.
pub const EVENT_TYPE_LABEL: &str = "event_type";

/// Counter: binlog events applied to buffers, by event type.
pub const BINSYNC_EVENTS_APPLIED_TOTAL: &str = "binsync_events_applied_total";

/// Counter: buffer flushes committed together with a new binlog position.
pub const BINSYNC_FLUSHES_TOTAL: &str = "binsync_flushes_total";

/// Counter: DDL statements rejected by the target's translator as syntax
/// errors and skipped. A growing value can indicate replication divergence.
pub const BINSYNC_DDL_SYNTAX_ERRORS_TOTAL: &str = "binsync_ddl_syntax_errors_total";

/// Histogram: seconds spent committing one flush (rows plus position).
pub const BINSYNC_FLUSH_DURATION_SECONDS: &str = "binsync_flush_duration_seconds";

/// Registers descriptions for all metrics emitted by the crate.
///
/// Safe to call more than once; recorders treat repeated descriptions as
/// idempotent.
pub fn register_metrics() {
    describe_counter!(
        BINSYNC_EVENTS_APPLIED_TOTAL,
        "Number of binlog events applied to row buffers"
    );
    describe_counter!(
        BINSYNC_FLUSHES_TOTAL,
        "Number of buffer flushes committed with a new binlog position"
    );
    describe_counter!(
        BINSYNC_DDL_SYNTAX_ERRORS_TOTAL,
        "Number of forwarded DDL statements skipped due to translator syntax errors"
    );
    describe_histogram!(
        BINSYNC_FLUSH_DURATION_SECONDS,
        "Time spent committing one flush, in seconds"
    );
}
