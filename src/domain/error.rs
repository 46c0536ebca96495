// Error taxonomy shared by the store, the transforms and the grid engine
use thiserror::Error;

/// What kind of entity a stale reference pointed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Category,
    Item,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Category => f.write_str("category"),
            EntityKind::Item => f.write_str("item"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("configuration '{0}' is not loaded")]
    NotLoaded(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} id '{id}' already exists")]
    DuplicateId { kind: EntityKind, id: String },

    #[error("mutation renamed configuration '{from}' to '{to}'")]
    IdentityChanged { from: String, to: String },

    #[error("no free placement for item '{item_id}' in a {columns}-column grid")]
    CollisionUnresolved { item_id: String, columns: u32 },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ConfigError {
    pub fn category_not_found(id: &str) -> Self {
        ConfigError::NotFound {
            kind: EntityKind::Category,
            id: id.to_string(),
        }
    }

    pub fn item_not_found(id: &str) -> Self {
        ConfigError::NotFound {
            kind: EntityKind::Item,
            id: id.to_string(),
        }
    }
}

/// Failure reported by a `ConfigRepository`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("retriable persistence failure: {0}")]
    Retriable(String),

    #[error("terminal persistence failure: {0}")]
    Terminal(String),
}

impl PersistenceError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, PersistenceError::Retriable(_))
    }
}
