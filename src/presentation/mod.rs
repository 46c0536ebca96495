// Presentation layer - HTTP surface over the store and edit mode
pub mod app_state;
pub mod error;
pub mod handlers;
pub mod router;
