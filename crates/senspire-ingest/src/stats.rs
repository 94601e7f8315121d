// Ingestion counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free ingestion counters
#[derive(Debug, Default)]
pub struct IngestStats {
    stored: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    overloaded: AtomicU64,
    unit_mismatches: AtomicU64,
    flagged: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStatsSnapshot {
    pub stored: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub overloaded: u64,
    pub unit_mismatches: u64,
    pub flagged: u64,
}

impl IngestStats {
    pub(crate) fn record_stored(&self, flagged: bool) {
        self.stored.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("senspire_ingest_stored_total").increment(1);
        if flagged {
            self.flagged.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("senspire_ingest_duplicates_total").increment(1);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("senspire_ingest_rejected_total").increment(1);
    }

    pub(crate) fn record_overloaded(&self) {
        self.overloaded.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("senspire_ingest_overloaded_total").increment(1);
    }

    pub(crate) fn record_unit_mismatch(&self) {
        self.unit_mismatches.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("senspire_ingest_unit_mismatch_total").increment(1);
    }

    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            stored: self.stored.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            overloaded: self.overloaded.load(Ordering::Relaxed),
            unit_mismatches: self.unit_mismatches.load(Ordering::Relaxed),
            flagged: self.flagged.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = IngestStats::default();
        stats.record_stored(false);
        stats.record_stored(true);
        stats.record_duplicate();
        stats.record_rejected();
        stats.record_overloaded();
        stats.record_unit_mismatch();

        assert_eq!(
            stats.snapshot(),
            IngestStatsSnapshot {
                stored: 2,
                duplicates: 1,
                rejected: 1,
                overloaded: 1,
                unit_mismatches: 1,
                flagged: 1,
            }
        );
    }
}
