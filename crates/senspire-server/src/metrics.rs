// Metric descriptions for the engine's counters and gauges

use metrics::{describe_counter, describe_gauge};

/// Register metric descriptions; call once at startup
pub fn init_metrics() {
    // Ingestion
    describe_counter!(
        "senspire_ingest_stored_total",
        "Measurements stored by the ingestion pipeline"
    );
    describe_counter!(
        "senspire_ingest_duplicates_total",
        "Duplicate measurements absorbed without storing"
    );
    describe_counter!(
        "senspire_ingest_rejected_total",
        "Measurements rejected as invalid"
    );
    describe_counter!(
        "senspire_ingest_overloaded_total",
        "Submissions refused because a sensor queue was full"
    );
    describe_counter!(
        "senspire_ingest_unit_mismatch_total",
        "Measurements stored with a non-canonical unit"
    );
    describe_gauge!("senspire_ingest_lanes", "Sensors with a running ingestion lane");

    // Hierarchy
    describe_counter!(
        "senspire_farm_recompute_total",
        "Committed farm total area recomputations"
    );
    describe_counter!(
        "senspire_farm_recompute_conflicts_total",
        "Farm recomputations that lost a revision race and retried"
    );
}
