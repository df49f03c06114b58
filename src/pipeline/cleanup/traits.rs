//! Trait definitions for the question cleanup pipeline.
//!
//! Two traits define the external collaborators:
//! - QuestionStore: backlog query, single fetch, single update
//! - AgentClient: text-in/text-out generative agent (extraction and review)

use async_trait::async_trait;

use super::error::AgentError;
use super::types::*;
use crate::db::DatabaseError;

/// Backing store holding the question records.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Page of inactive records whose statement contains any of `tokens`,
    /// ordered by ascending id.
    async fn list_corrupted(
        &self,
        tokens: &[&str],
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CorruptedRecord>, DatabaseError>;

    /// Number of records matching the same predicate as `list_corrupted`.
    async fn count_corrupted(&self, tokens: &[&str]) -> Result<u64, DatabaseError>;

    async fn fetch(&self, id: i64) -> Result<Option<CorruptedRecord>, DatabaseError>;

    /// Write cleaned content, alternatives, images and activation in one step.
    async fn update(&self, id: i64, update: &RecordUpdate) -> Result<(), DatabaseError>;
}

/// A generative agent reached over some transport.
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn generate(&self, model: &str, system: &str, prompt: &str) -> Result<String, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify traits are object-safe (can be used as `dyn Trait`)
    #[test]
    fn traits_are_object_safe() {
        fn _assert_store(_: &dyn QuestionStore) {}
        fn _assert_agent(_: &dyn AgentClient) {}
    }
}
