use crate::core::change_feed::Subscription;
use crate::domain::model::{SearchRequest, SelectionChange};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Remote search collaborator. Returns raw records; normalization happens in the core.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<serde_json::Value>>;
}

/// Whole-snapshot key/value storage. Calls are synchronous with respect to the caller.
pub trait DurableStorage: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, payload: &str) -> Result<()>;
}

/// Subscribable stream of full selection snapshots.
pub trait ChangeFeed: Send + Sync {
    fn publish(&self, change: &SelectionChange) -> Result<()>;
    fn subscribe(&self) -> Subscription;
}
