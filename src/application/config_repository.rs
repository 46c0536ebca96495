// Repository trait for configuration document storage
use crate::domain::document::ConfigDocument;
use crate::domain::error::PersistenceError;
use async_trait::async_trait;

#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Load a named document, `None` if it was never saved
    async fn load(&self, name: &str) -> Result<Option<ConfigDocument>, PersistenceError>;

    /// Durably store the document under `name`
    async fn save(&self, name: &str, document: &ConfigDocument) -> Result<(), PersistenceError>;
}
