// Metric names and descriptions for the membership layer

use metrics::{describe_counter, describe_gauge};

pub const LEASE_REFRESHES_TOTAL: &str = "rollcall_lease_refreshes_total";
pub const HEARTBEAT_FAILURES_TOTAL: &str = "rollcall_heartbeat_failures_total";
pub const ORDINAL_CHANGES_TOTAL: &str = "rollcall_ordinal_changes_total";
pub const EVICTIONS_TOTAL: &str = "rollcall_evictions_total";
pub const MONITOR_FAILURES_TOTAL: &str = "rollcall_monitor_failures_total";
pub const CLUSTER_SIZE: &str = "rollcall_cluster_size";

/// Register metric descriptions with the installed recorder.
/// Call once at startup, after installing an exporter.
pub fn describe_metrics() {
    describe_counter!(
        LEASE_REFRESHES_TOTAL,
        "Successful register-or-refresh calls"
    );
    describe_counter!(
        HEARTBEAT_FAILURES_TOTAL,
        "Heartbeat ticks that failed to refresh the lease"
    );
    describe_counter!(
        ORDINAL_CHANGES_TOTAL,
        "Heartbeat refreshes that returned a different ordinal than before"
    );
    describe_counter!(EVICTIONS_TOTAL, "Nodes evicted by monitor sweeps");
    describe_counter!(MONITOR_FAILURES_TOTAL, "Monitor sweeps that failed");
    describe_gauge!(
        CLUSTER_SIZE,
        "Live node count observed by the most recent node info read"
    );
}
