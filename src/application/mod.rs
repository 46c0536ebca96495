// Application layer - Store, persistence, grid binding and edit mode
pub mod config_repository;
pub mod config_store;
pub mod edit_mode;
pub mod grid_engine;
pub mod persistence_gateway;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock that keeps working after a listener panicked while it was held
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
