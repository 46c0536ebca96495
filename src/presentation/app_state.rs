// Application state for HTTP handlers
use crate::application::config_store::ConfigStore;
use crate::application::edit_mode::EditMode;
use crate::infrastructure::config::GridSettings;

#[derive(Clone)]
pub struct AppState {
    pub store: ConfigStore,
    pub edit_mode: EditMode,
    /// Column counts and row limit handed to every rendered container
    pub grid: GridSettings,
}
