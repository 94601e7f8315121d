use senspire_common::DEFAULT_SCAN_BATCH_SIZE;

/// Query engine configuration
#[derive(Debug, Clone, Copy)]
pub struct QueryConfig {
    /// Plots fetched per page of a spatial scan
    pub scan_batch_size: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
        }
    }
}
