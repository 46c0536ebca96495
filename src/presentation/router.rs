use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    get_category_layout, get_config, get_edit_mode, health_check, save_status, set_layout_flag, set_meta_title,
    stream_config, stream_edit_mode, toggle_edit_mode,
};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    // JSON bodies are compressed by the handlers, streams must stay unencoded
    Router::new()
        .route("/healthz", get(health_check))
        .route("/configs/:name", get(get_config))
        .route("/configs/:name/stream", get(stream_config))
        .route("/configs/:name/categories/:category_id/layout/:breakpoint", get(get_category_layout))
        .route("/configs/:name/layout/:flag", put(set_layout_flag))
        .route("/configs/:name/meta-title", put(set_meta_title))
        .route("/configs/:name/save-status", get(save_status))
        .route("/edit-mode", get(get_edit_mode))
        .route("/edit-mode/stream", get(stream_edit_mode))
        .route("/edit-mode/toggle", post(toggle_edit_mode))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config_repository::testing::InMemoryRepository;
    use crate::application::config_store::ConfigStore;
    use crate::application::edit_mode::EditMode;
    use crate::application::persistence_gateway::{PersistenceGateway, PersistenceSettings};

    #[test]
    fn test_routes_register() {
        let gateway = PersistenceGateway::new(Arc::new(InMemoryRepository::new()), PersistenceSettings::default());
        let state = Arc::new(AppState {
            store: ConfigStore::new(Arc::new(gateway)),
            edit_mode: EditMode::new(),
            grid: Default::default(),
        });
        let _router = router(state);
    }
}
