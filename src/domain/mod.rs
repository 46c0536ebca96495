// Domain layer - Configuration document, pure transforms and grid geometry
pub mod document;
pub mod error;
pub mod grid;
pub mod transforms;
