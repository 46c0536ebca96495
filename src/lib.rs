//! Dashboard layout and configuration synchronization engine.
//!
//! `application::config_store::ConfigStore` owns every loaded document and
//! is the only place that mutates one. Grid containers bind to it through
//! `application::grid_engine::GridLayoutEngine`; durability is handled by
//! `application::persistence_gateway::PersistenceGateway`.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
