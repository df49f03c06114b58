//! Record updater: single write point for cleaned records.

use std::sync::Arc;

use super::traits::QuestionStore;
use super::types::RecordUpdate;
use crate::db::DatabaseError;

pub struct RecordUpdater {
    store: Arc<dyn QuestionStore>,
}

impl RecordUpdater {
    pub fn new(store: Arc<dyn QuestionStore>) -> Self {
        Self { store }
    }

    /// Persist content, alternatives, images and activation together.
    /// Only the cleaned fields are touched; metadata stays as stored.
    pub async fn apply(&self, record_id: i64, update: &RecordUpdate) -> Result<(), DatabaseError> {
        self.store.update(record_id, update).await?;
        tracing::debug!(
            record_id,
            active = update.active,
            images = update.images.len(),
            alternatives = update.alternatives.len(),
            "Record updated"
        );
        Ok(())
    }
}
