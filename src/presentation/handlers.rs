// HTTP request handlers
use crate::application::config_store::ConfigChange;
use crate::application::grid_engine::GridViewport;
use crate::application::persistence_gateway::PersistMode;
use crate::domain::document::{Breakpoint, ConfigDocument, LayoutFlag};
use crate::domain::error::ConfigError;
use crate::domain::grid::{self, ItemSlot};
use crate::domain::transforms;
use crate::infrastructure::chunked_json::ndjson_stream;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use crate::presentation::error::ApiError;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::WatchStream;

#[derive(Debug, Default, Deserialize)]
pub struct PersistQuery {
    #[serde(default)]
    pub persist: PersistMode,
}

#[derive(Debug, Deserialize)]
pub struct LayoutFlagBody {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaTitleBody {
    pub meta_title: Option<String>,
}

/// One line of `GET /configs/:name/stream`, also the body of `GET /configs/:name`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigEvent {
    pub name: String,
    pub revision: u64,
    pub document: ConfigDocument,
}

impl From<&ConfigChange> for ConfigEvent {
    fn from(change: &ConfigChange) -> Self {
        Self {
            name: change.name.clone(),
            revision: change.revision,
            document: change.document.as_ref().clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigView {
    #[serde(flatten)]
    pub config: ConfigEvent,
    /// Grid each breakpoint renders with
    pub viewports: Vec<GridViewport>,
}

#[derive(Debug, Serialize)]
pub struct CategoryLayout {
    pub viewport: GridViewport,
    pub slots: Vec<ItemSlot>,
}

async fn respond<T: Serialize>(headers: &HeaderMap, data: &T) -> Response {
    match json_response(StatusCode::OK, data, accepts_brotli(headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current document, loading it from storage on first access
pub async fn get_config(
    Path(name): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    state.store.load(&name).await?;
    let (document, revision) = state
        .store
        .snapshot(&name)
        .ok_or_else(|| ConfigError::NotLoaded(name.clone()))?;

    let view = ConfigView {
        config: ConfigEvent {
            name,
            revision,
            document: document.as_ref().clone(),
        },
        viewports: [Breakpoint::Small, Breakpoint::Medium, Breakpoint::Large]
            .into_iter()
            .map(|breakpoint| state.grid.viewport(breakpoint))
            .collect(),
    };
    Ok(respond(&headers, &view).await)
}

/// Slots of one category as a container at `breakpoint` would show them
pub async fn get_category_layout(
    Path((name, category_id, breakpoint)): Path<(String, String, Breakpoint)>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let document = state.store.load(&name).await?;
    let category = transforms::category(&document, &category_id)?;
    let viewport = state.grid.viewport(breakpoint);

    let layout = CategoryLayout {
        viewport,
        slots: grid::arrange(&category.items, breakpoint, viewport.columns),
    };
    Ok(respond(&headers, &layout).await)
}

/// Current document followed by every later change, one JSON object per line
pub async fn stream_config(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    state.store.load(&name).await?;

    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = state.store.subscribe(&name, move |change| {
        let _ = tx.send(ConfigEvent::from(change));
    })?;
    let (document, revision) = state
        .store
        .snapshot(&name)
        .ok_or_else(|| ConfigError::NotLoaded(name.clone()))?;

    tracing::debug!(config = %name, revision, "Client subscribed to configuration stream");
    let initial = ConfigEvent {
        name,
        revision,
        document: document.as_ref().clone(),
    };

    Ok(match ndjson_stream(newer_changes(initial, rx, subscription)) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    })
}

/// `initial`, then every event newer than the last one sent. `guard` lives as long as the stream.
fn newer_changes<G>(
    initial: ConfigEvent,
    mut rx: mpsc::UnboundedReceiver<ConfigEvent>,
    guard: G,
) -> impl Stream<Item = ConfigEvent> + Send + 'static
where
    G: Send + 'static,
{
    async_stream::stream! {
        let _guard = guard;
        let mut seen = initial.revision;
        yield initial;
        // Listeners run outside the store lock and may deliver out of order
        while let Some(event) = rx.recv().await {
            if event.revision > seen {
                seen = event.revision;
                yield event;
            }
        }
    }
}

pub async fn set_layout_flag(
    Path((name, flag)): Path<(String, LayoutFlag)>,
    Query(query): Query<PersistQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(body): Json<LayoutFlagBody>,
) -> Result<Response, ApiError> {
    state.store.load(&name).await?;
    let document = state.store.update_config(
        &name,
        |doc| transforms::set_layout_flag(doc, flag, body.enabled),
        query.persist,
    )?;

    tracing::info!(config = %name, ?flag, enabled = body.enabled, mode = ?query.persist, "Layout flag changed");
    Ok(respond(&headers, &document.settings.customization.layout).await)
}

pub async fn set_meta_title(
    Path(name): Path<String>,
    Query(query): Query<PersistQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(body): Json<MetaTitleBody>,
) -> Result<Response, ApiError> {
    state.store.load(&name).await?;
    let document = state.store.update_config(
        &name,
        |doc| transforms::set_meta_title(doc, body.meta_title.as_deref()),
        query.persist,
    )?;

    let meta_title = &document.settings.customization.meta_title;
    Ok(respond(&headers, &json!({ "metaTitle": meta_title })).await)
}

pub async fn save_status(
    Path(name): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let status = state.store.gateway().status(&name);
    respond(&headers, &status).await
}

pub async fn get_edit_mode(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "enabled": state.edit_mode.is_enabled() }))
}

pub async fn toggle_edit_mode(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let enabled = state.edit_mode.toggle();
    tracing::info!(enabled, "Edit mode toggled");
    Json(json!({ "enabled": enabled }))
}

/// Current edit mode, then one line per change
pub async fn stream_edit_mode(State(state): State<Arc<AppState>>) -> Response {
    let stream = WatchStream::new(state.edit_mode.watch()).map(|enabled| json!({ "enabled": enabled }));
    match ndjson_stream(stream) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
