// Per-farm mutation locks with bounded wait

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, warn};

use senspire_common::{FarmId, SenspireError};

/// Table of per-farm reader/writer locks.
///
/// Writers are structural mutations of a farm; readers are consistent
/// snapshots. Waiting longer than `timeout` fails with `Overloaded`.
pub struct FarmLocks {
    pub(crate) locks: DashMap<FarmId, Arc<RwLock<()>>>,
    timeout: Duration,
}

impl FarmLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    fn handle(&self, farm_id: FarmId) -> Arc<RwLock<()>> {
        self.locks.entry(farm_id).or_default().value().clone()
    }

    /// Acquire the farm's write lock
    pub async fn write(&self, farm_id: FarmId) -> Result<OwnedRwLockWriteGuard<()>, SenspireError> {
        let lock = self.handle(farm_id);
        match tokio::time::timeout(self.timeout, lock.write_owned()).await {
            Ok(guard) => {
                debug!(farm_id = %farm_id, "Farm write lock acquired");
                Ok(guard)
            }
            Err(_) => {
                warn!(farm_id = %farm_id, timeout_ms = self.timeout.as_millis() as u64, "Timed out waiting for farm write lock");
                Err(SenspireError::Overloaded(format!(
                    "timed out waiting for farm '{}' lock",
                    farm_id
                )))
            }
        }
    }

    /// Acquire the farm's read lock
    pub async fn read(&self, farm_id: FarmId) -> Result<OwnedRwLockReadGuard<()>, SenspireError> {
        let lock = self.handle(farm_id);
        match tokio::time::timeout(self.timeout, lock.read_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                warn!(farm_id = %farm_id, timeout_ms = self.timeout.as_millis() as u64, "Timed out waiting for farm read lock");
                Err(SenspireError::Overloaded(format!(
                    "timed out waiting for farm '{}' lock",
                    farm_id
                )))
            }
        }
    }

    /// Drop the lock entry of a deleted farm
    pub fn forget(&self, farm_id: FarmId) {
        self.locks.remove(&farm_id);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_write_timeout_is_overloaded() {
        let locks = FarmLocks::new(Duration::from_millis(20));
        let farm = Uuid::new_v4();

        let _held = locks.write(farm).await.unwrap();
        let err = locks.write(farm).await.unwrap_err();
        assert!(matches!(err, SenspireError::Overloaded(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_readers_share() {
        let locks = FarmLocks::new(Duration::from_millis(20));
        let farm = Uuid::new_v4();

        let _a = locks.read(farm).await.unwrap();
        let _b = locks.read(farm).await.unwrap();
        assert!(locks.write(farm).await.is_err());
    }

    #[tokio::test]
    async fn test_farms_are_independent() {
        let locks = FarmLocks::new(Duration::from_millis(20));
        let _a = locks.write(Uuid::new_v4()).await.unwrap();
        let _b = locks.write(Uuid::new_v4()).await.unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_forget() {
        let locks = FarmLocks::new(Duration::from_millis(20));
        let farm = Uuid::new_v4();
        drop(locks.write(farm).await.unwrap());
        locks.forget(farm);
        assert!(locks.is_empty());
    }
}
