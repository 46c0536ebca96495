// Edit mode - session-scoped browse/edit switch
use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable handle to one session's edit-mode flag. Starts disabled.
#[derive(Clone)]
pub struct EditMode {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for EditMode {
    fn default() -> Self {
        Self::new()
    }
}

impl EditMode {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_enabled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn enable(&self) {
        self.set(true);
    }

    pub fn disable(&self) {
        self.set(false);
    }

    /// Flip the flag and return the new value
    pub fn toggle(&self) -> bool {
        let mut enabled = false;
        self.tx.send_modify(|value| {
            *value = !*value;
            enabled = *value;
        });
        tracing::debug!(enabled, "Edit mode toggled");
        enabled
    }

    pub fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    fn set(&self, enabled: bool) {
        let previous = self.tx.send_replace(enabled);
        if previous != enabled {
            tracing::debug!(enabled, "Edit mode changed");
        }
    }
}
