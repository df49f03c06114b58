//! Corruption detector: finds records whose statement still carries leaked
//! template markup and that have not been reactivated yet.
//!
//! Store failures are logged and absorbed; callers see an empty backlog.

use std::sync::Arc;

use super::signature::CORRUPTION_SIGNATURE;
use super::traits::QuestionStore;
use super::types::CorruptedRecord;

pub struct CorruptionDetector {
    store: Arc<dyn QuestionStore>,
}

impl CorruptionDetector {
    pub fn new(store: Arc<dyn QuestionStore>) -> Self {
        Self { store }
    }

    /// Page of corrupted records in ascending id order.
    pub async fn list_corrupted(&self, limit: u32, offset: u32) -> Vec<CorruptedRecord> {
        match self.store.list_corrupted(CORRUPTION_SIGNATURE, limit, offset).await {
            Ok(records) => {
                tracing::debug!(limit, offset, found = records.len(), "Corrupted records listed");
                records
            }
            Err(e) => {
                tracing::error!(error = %e, limit, offset, "Failed to list corrupted records");
                Vec::new()
            }
        }
    }

    /// Size of the backlog.
    pub async fn count_corrupted(&self) -> u64 {
        match self.store.count_corrupted(CORRUPTION_SIGNATURE).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Failed to count corrupted records");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::db::DatabaseError;
    use crate::pipeline::cleanup::store::tests::{insert_question, memory_store};
    use crate::pipeline::cleanup::types::RecordUpdate;

    /// Store whose every call fails.
    struct BrokenStore;

    #[async_trait]
    impl QuestionStore for BrokenStore {
        async fn list_corrupted(
            &self,
            _tokens: &[&str],
            _limit: u32,
            _offset: u32,
        ) -> Result<Vec<CorruptedRecord>, DatabaseError> {
            Err(DatabaseError::LockPoisoned)
        }

        async fn count_corrupted(&self, _tokens: &[&str]) -> Result<u64, DatabaseError> {
            Err(DatabaseError::LockPoisoned)
        }

        async fn fetch(&self, _id: i64) -> Result<Option<CorruptedRecord>, DatabaseError> {
            Err(DatabaseError::LockPoisoned)
        }

        async fn update(&self, _id: i64, _update: &RecordUpdate) -> Result<(), DatabaseError> {
            Err(DatabaseError::LockPoisoned)
        }
    }

    #[tokio::test]
    async fn lists_and_counts_backlog() {
        let store = memory_store();
        insert_question(&store, 1, Some("<div ng-if=\"vm.x\">a</div>"), false);
        insert_question(&store, 2, Some("<!-- ngIf: vm.y -->b"), false);
        insert_question(&store, 3, Some("texto limpo"), false);
        let detector = CorruptionDetector::new(Arc::new(store));

        assert_eq!(detector.count_corrupted().await, 2);
        let ids: Vec<i64> = detector.list_corrupted(10, 0).await.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        let rest = detector.list_corrupted(10, 1).await;
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, 2);
    }

    #[tokio::test]
    async fn store_failure_reads_as_empty_backlog() {
        let detector = CorruptionDetector::new(Arc::new(BrokenStore));
        assert!(detector.list_corrupted(10, 0).await.is_empty());
        assert_eq!(detector.count_corrupted().await, 0);
    }
}
