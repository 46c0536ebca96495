//! Grid layout engine - binds one rendered category container to the store.
//!
//! Gestures become store mutations; collision resolution runs inside the
//! mutator so it always sees the latest document. Changes that came from
//! somewhere else are pulled into the view without writing anything back.

use crate::application::config_store::{ConfigChange, ConfigStore, Subscription, SurfaceId};
use crate::application::edit_mode::EditMode;
use crate::application::lock;
use crate::application::persistence_gateway::PersistMode;
use crate::domain::document::{Breakpoint, ConfigDocument, Item, Placement};
use crate::domain::error::ConfigError;
use crate::domain::grid::{self, ItemSlot};
use crate::domain::transforms;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const TRANSITION_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineState {
    Uninitialized,
    Bound,
    Interactive,
    Syncing,
    TornDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridViewport {
    pub breakpoint: Breakpoint,
    pub columns: u32,
    pub max_rows: Option<u32>,
}

/// What the rendering layer mounts: one wrapper, one slot per item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub config_name: String,
    pub category_id: String,
    pub breakpoint: Breakpoint,
    pub columns: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    BrowseMode,
    TornDown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureOutcome {
    Applied(Placement),
    Removed,
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Bound,
    Syncing,
    TornDown,
}

struct GridView {
    phase: Phase,
    viewport: GridViewport,
    slots: Vec<ItemSlot>,
    revision: u64,
    sync_count: u64,
    transitions: broadcast::Sender<EngineState>,
}

impl GridView {
    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        let state = match phase {
            Phase::Uninitialized => EngineState::Uninitialized,
            Phase::Bound => EngineState::Bound,
            Phase::Syncing => EngineState::Syncing,
            Phase::TornDown => EngineState::TornDown,
        };
        // Nobody watching is fine
        let _ = self.transitions.send(state);
    }

    fn arrange_from(&mut self, document: &ConfigDocument, category_id: &str) {
        self.slots = match transforms::category(document, category_id) {
            Ok(category) => grid::arrange(&category.items, self.viewport.breakpoint, self.viewport.columns),
            Err(_) => {
                tracing::debug!(category = %category_id, "Category no longer in document, clearing view");
                Vec::new()
            }
        };
    }

    /// Pull a document into the view. Returns false for stale or ignored changes.
    fn absorb(&mut self, document: &ConfigDocument, revision: u64, category_id: &str, foreign: bool) -> bool {
        match self.phase {
            Phase::TornDown => return false,
            Phase::Uninitialized => {}
            Phase::Bound | Phase::Syncing if revision <= self.revision => return false,
            Phase::Bound | Phase::Syncing => {}
        }

        if foreign && self.phase == Phase::Bound {
            self.enter(Phase::Syncing);
            self.sync_count += 1;
        }
        self.arrange_from(document, category_id);
        self.revision = revision;
        self.enter(Phase::Bound);
        true
    }
}

pub struct GridLayoutEngine {
    surface: SurfaceId,
    config_name: String,
    category_id: String,
    store: ConfigStore,
    edit_mode: EditMode,
    view: Arc<Mutex<GridView>>,
    subscription: Option<Subscription>,
}

impl GridLayoutEngine {
    /// Bind a container to the current document for `category_id`
    pub fn mount(
        store: &ConfigStore,
        edit_mode: &EditMode,
        config_name: &str,
        category_id: &str,
        viewport: GridViewport,
    ) -> Result<Self, ConfigError> {
        let (document, _) = store
            .snapshot(config_name)
            .ok_or_else(|| ConfigError::NotLoaded(config_name.to_string()))?;
        transforms::category(&document, category_id)?;

        let surface = store.register_surface();
        let view = Arc::new(Mutex::new(GridView {
            phase: Phase::Uninitialized,
            viewport,
            slots: Vec::new(),
            revision: 0,
            sync_count: 0,
            transitions: broadcast::channel(TRANSITION_CAPACITY).0,
        }));

        // Subscribe before reading the snapshot so no change can fall in between
        let subscription = {
            let view = view.clone();
            let category_id = category_id.to_string();
            store.subscribe(config_name, move |change: &ConfigChange| {
                let foreign = change.origin != Some(surface);
                let absorbed = lock(&view).absorb(&change.document, change.revision, &category_id, foreign);
                if absorbed && foreign {
                    tracing::debug!(category = %category_id, revision = change.revision, "Synced grid from external change");
                }
            })?
        };

        let (document, revision) = store
            .snapshot(config_name)
            .ok_or_else(|| ConfigError::NotLoaded(config_name.to_string()))?;
        lock(&view).absorb(&document, revision, category_id, false);

        tracing::debug!(config = %config_name, category = %category_id, columns = viewport.columns, "Mounted grid container");
        Ok(Self {
            surface,
            config_name: config_name.to_string(),
            category_id: category_id.to_string(),
            store: store.clone(),
            edit_mode: edit_mode.clone(),
            view,
            subscription: Some(subscription),
        })
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn state(&self) -> EngineState {
        match lock(&self.view).phase {
            Phase::Uninitialized => EngineState::Uninitialized,
            Phase::Syncing => EngineState::Syncing,
            Phase::TornDown => EngineState::TornDown,
            Phase::Bound if self.edit_mode.is_enabled() => EngineState::Interactive,
            Phase::Bound => EngineState::Bound,
        }
    }

    pub fn container(&self) -> ContainerHandle {
        let viewport = lock(&self.view).viewport;
        ContainerHandle {
            config_name: self.config_name.clone(),
            category_id: self.category_id.clone(),
            breakpoint: viewport.breakpoint,
            columns: viewport.columns,
        }
    }

    pub fn slots(&self) -> Vec<ItemSlot> {
        lock(&self.view).slots.clone()
    }

    pub fn slot(&self, item_id: &str) -> Option<ItemSlot> {
        lock(&self.view)
            .slots
            .iter()
            .find(|s| s.item_id == item_id)
            .cloned()
    }

    /// Every phase change from now on. `state()` only ever sees the settled
    /// phase, a sync passes through `Syncing` while the view lock is held.
    /// `Bound` is sent whatever the edit mode is.
    pub fn transitions(&self) -> broadcast::Receiver<EngineState> {
        lock(&self.view).transitions.subscribe()
    }

    /// Number of times the view was refreshed by a change made elsewhere
    pub fn sync_count(&self) -> u64 {
        lock(&self.view).sync_count
    }

    /// Switch breakpoint or column count; only the view is recomputed
    pub fn set_viewport(&self, breakpoint: Breakpoint, columns: u32) {
        let document = self.store.get(&self.config_name);
        let mut view = lock(&self.view);
        if view.phase == Phase::TornDown {
            return;
        }
        view.viewport.breakpoint = breakpoint;
        view.viewport.columns = columns;
        if let Some(document) = document {
            view.arrange_from(&document, &self.category_id);
        }
    }

    /// Drag-end or resize-end for an item of this container
    pub fn on_gesture_end(&self, item_id: &str, proposed: Placement) -> Result<GestureOutcome, ConfigError> {
        if let Some(reason) = self.ignore_reason() {
            return Ok(GestureOutcome::Ignored(reason));
        }
        let viewport = lock(&self.view).viewport;
        let previous = self.slot(item_id).map(|s| s.placement);
        let category_id = &self.category_id;

        let mut landed = None;
        self.mutate(|doc| {
            let category = transforms::category(doc, category_id)?;
            if !category.items.iter().any(|i| i.id == item_id) {
                return Err(ConfigError::item_not_found(item_id));
            }
            let occupied = occupied_by_others(&category.items, item_id, viewport);
            let placement = grid::resolve_placement(item_id, proposed, previous, &occupied, viewport.columns, viewport.max_rows)?;
            landed = Some(placement);
            transforms::set_placement(doc, item_id, viewport.breakpoint, placement)
        })?;

        Ok(applied(landed))
    }

    /// Drop an item of this container into another category's container.
    /// Removal and insertion happen in one store update.
    pub fn move_to_category(
        &self,
        item_id: &str,
        dest_category_id: &str,
        proposed: Placement,
    ) -> Result<GestureOutcome, ConfigError> {
        if dest_category_id == self.category_id {
            return self.on_gesture_end(item_id, proposed);
        }
        if let Some(reason) = self.ignore_reason() {
            return Ok(GestureOutcome::Ignored(reason));
        }
        let viewport = lock(&self.view).viewport;
        let category_id = &self.category_id;

        let mut landed = None;
        self.mutate(|doc| {
            let source = transforms::category(doc, category_id)?;
            if !source.items.iter().any(|i| i.id == item_id) {
                return Err(ConfigError::item_not_found(item_id));
            }
            let dest = transforms::category(doc, dest_category_id)?;
            let occupied = occupied_by_others(&dest.items, item_id, viewport);
            let placement = grid::resolve_placement(item_id, proposed, None, &occupied, viewport.columns, viewport.max_rows)?;
            landed = Some(placement);
            transforms::move_item(doc, item_id, dest_category_id, viewport.breakpoint, placement)
        })?;

        tracing::debug!(item = %item_id, from = %self.category_id, to = %dest_category_id, "Moved item across categories");
        Ok(applied(landed))
    }

    pub fn add_item(&self, item: Item, proposed: Placement) -> Result<GestureOutcome, ConfigError> {
        if let Some(reason) = self.ignore_reason() {
            return Ok(GestureOutcome::Ignored(reason));
        }
        let viewport = lock(&self.view).viewport;
        let category_id = &self.category_id;

        let mut landed = None;
        self.mutate(|doc| {
            let category = transforms::category(doc, category_id)?;
            let occupied = occupied_by_others(&category.items, &item.id, viewport);
            let placement = grid::resolve_placement(&item.id, proposed, None, &occupied, viewport.columns, viewport.max_rows)?;
            landed = Some(placement);
            transforms::add_item(doc, category_id, item.placed(viewport.breakpoint, placement))
        })?;

        Ok(applied(landed))
    }

    pub fn remove_item(&self, item_id: &str) -> Result<GestureOutcome, ConfigError> {
        if let Some(reason) = self.ignore_reason() {
            return Ok(GestureOutcome::Ignored(reason));
        }
        let category_id = &self.category_id;

        self.mutate(|doc| {
            let category = transforms::category(doc, category_id)?;
            if !category.items.iter().any(|i| i.id == item_id) {
                return Err(ConfigError::item_not_found(item_id));
            }
            transforms::remove_item(doc, item_id)
        })?;

        Ok(GestureOutcome::Removed)
    }

    /// Release the subscription and the view
    pub fn tear_down(&mut self) {
        self.subscription.take();
        let mut view = lock(&self.view);
        view.enter(Phase::TornDown);
        view.slots.clear();
        tracing::debug!(config = %self.config_name, category = %self.category_id, "Tore down grid container");
    }

    fn ignore_reason(&self) -> Option<IgnoreReason> {
        if lock(&self.view).phase == Phase::TornDown {
            Some(IgnoreReason::TornDown)
        } else if !self.edit_mode.is_enabled() {
            Some(IgnoreReason::BrowseMode)
        } else {
            None
        }
    }

    // The view lock must not be held here: the store calls our listener synchronously
    fn mutate<F>(&self, mutator: F) -> Result<Arc<ConfigDocument>, ConfigError>
    where
        F: FnOnce(&ConfigDocument) -> Result<ConfigDocument, ConfigError>,
    {
        self.store
            .update_config_from(Some(self.surface), &self.config_name, mutator, PersistMode::Debounced)
            .inspect_err(|e| {
                tracing::debug!(category = %self.category_id, error = %e, "Gesture rejected, view keeps last placement");
            })
    }
}

/// Cells the item may not land on: where the others are shown, and where
/// they are stored when the view had to move them
fn occupied_by_others(items: &[Item], item_id: &str, viewport: GridViewport) -> Vec<Placement> {
    let shown = grid::arrange(items, viewport.breakpoint, viewport.columns)
        .into_iter()
        .filter(|s| s.item_id != item_id)
        .map(|s| s.placement);
    let stored = items
        .iter()
        .filter(|i| i.id != item_id)
        .filter_map(|i| i.placement_at(viewport.breakpoint))
        .map(Placement::normalized);
    shown.chain(stored).collect()
}

fn applied(landed: Option<Placement>) -> GestureOutcome {
    match landed {
        Some(placement) => GestureOutcome::Applied(placement),
        None => GestureOutcome::Removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config_repository::testing::InMemoryRepository;
    use crate::application::persistence_gateway::{PersistenceGateway, PersistenceSettings};
    use crate::domain::document::Category;
    use proptest::prelude::*;
    use std::time::Duration;

    const LARGE: GridViewport = GridViewport {
        breakpoint: Breakpoint::Large,
        columns: 6,
        max_rows: None,
    };

    fn dashboard() -> ConfigDocument {
        ConfigDocument::new("default")
            .with_category(
                Category::new("c1", "Media")
                    .with_item(Item::app("a1", "Plex", "http://plex").placed(Breakpoint::Large, Placement::new(0, 0, 2, 1)))
                    .with_item(Item::widget("w1", "weather").placed(Breakpoint::Large, Placement::new(2, 0, 2, 2)))
                    .with_item(
                        Item::app("a2", "Radarr", "http://radarr")
                            .placed(Breakpoint::Large, Placement::new(4, 0, 1, 1))
                            .placed(Breakpoint::Small, Placement::new(0, 3, 1, 1)),
                    ),
            )
            .with_category(
                Category::new("c2", "Downloads")
                    .with_item(Item::app("a3", "qBit", "http://qbit").placed(Breakpoint::Large, Placement::new(0, 0, 1, 1))),
            )
    }

    struct Fixture {
        repo: Arc<InMemoryRepository>,
        store: ConfigStore,
        edit_mode: EditMode,
    }

    async fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryRepository::new().with_document(dashboard()));
        let gateway = Arc::new(PersistenceGateway::new(repo.clone(), PersistenceSettings::default()));
        let store = ConfigStore::new(gateway);
        store.load("default").await.unwrap();
        let edit_mode = EditMode::new();
        edit_mode.enable();
        Fixture { repo, store, edit_mode }
    }

    impl Fixture {
        fn mount(&self, category_id: &str) -> GridLayoutEngine {
            GridLayoutEngine::mount(&self.store, &self.edit_mode, "default", category_id, LARGE).unwrap()
        }
    }

    fn placements(engine: &GridLayoutEngine) -> Vec<Placement> {
        engine.slots().into_iter().map(|s| s.placement).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_binds_current_placements() {
        let fx = fixture().await;
        let engine = fx.mount("c1");

        assert_eq!(engine.state(), EngineState::Interactive);
        assert_eq!(engine.slots().len(), 3);
        assert_eq!(engine.slot("w1").unwrap().placement, Placement::new(2, 0, 2, 2));
        assert_eq!(engine.container().columns, 6);

        fx.edit_mode.disable();
        assert_eq!(engine.state(), EngineState::Bound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_unknown_category_is_not_found() {
        let fx = fixture().await;
        let err = GridLayoutEngine::mount(&fx.store, &fx.edit_mode, "default", "zzz", LARGE).err().unwrap();
        assert_eq!(err, ConfigError::category_not_found("zzz"));

        let err = GridLayoutEngine::mount(&fx.store, &fx.edit_mode, "other", "c1", LARGE).err().unwrap();
        assert_eq!(err, ConfigError::NotLoaded("other".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_browse_mode_ignores_gestures() {
        let fx = fixture().await;
        let engine = fx.mount("c1");
        fx.edit_mode.disable();

        let outcome = engine.on_gesture_end("a1", Placement::new(0, 3, 2, 1)).unwrap();
        assert_eq!(outcome, GestureOutcome::Ignored(IgnoreReason::BrowseMode));
        assert_eq!(fx.store.snapshot("default").unwrap().1, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_onto_neighbour_lands_nearby() {
        let fx = fixture().await;
        let engine = fx.mount("c1");

        // a1 dragged right onto w1
        let outcome = engine.on_gesture_end("a1", Placement::new(2, 0, 2, 1)).unwrap();
        let GestureOutcome::Applied(landed) = outcome else {
            panic!("expected placement, got {outcome:?}");
        };

        assert_eq!(engine.slot("a1").unwrap().placement, landed);
        assert!(!grid::has_overlap(&placements(&engine)));
        let doc = fx.store.get("default").unwrap();
        let (_, item) = transforms::find_item(&doc, "a1").unwrap();
        assert_eq!(item.placement_at(Breakpoint::Large), Some(landed));
        assert_eq!(engine.sync_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gesture_writes_only_active_breakpoint() {
        let fx = fixture().await;
        let engine = fx.mount("c1");

        engine.on_gesture_end("a2", Placement::new(5, 3, 1, 1)).unwrap();

        let doc = fx.store.get("default").unwrap();
        let (_, item) = transforms::find_item(&doc, "a2").unwrap();
        assert_eq!(item.placement_at(Breakpoint::Large), Some(Placement::new(5, 3, 1, 1)));
        assert_eq!(item.placement_at(Breakpoint::Small), Some(Placement::new(0, 3, 1, 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_frames_coalesce_into_one_save() {
        let fx = fixture().await;
        let engine = fx.mount("c1");

        for y in 1..=8 {
            engine.on_gesture_end("a2", Placement::new(5, y, 1, 1)).unwrap();
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        let saves = fx.repo.saves();
        assert_eq!(saves.len(), 1);
        let (_, item) = transforms::find_item(&saves[0].1, "a2").unwrap();
        assert_eq!(item.placement_at(Breakpoint::Large), Some(Placement::new(5, 8, 1, 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gesture_avoids_stored_cells_of_relocated_neighbour() {
        let repo = Arc::new(InMemoryRepository::new().with_document(ConfigDocument::new("narrow").with_category(
            Category::new("c1", "Tools")
                .with_item(Item::app("a1", "One", "http://one").placed(Breakpoint::Large, Placement::new(0, 0, 1, 1)))
                .with_item(Item::widget("w1", "clock").placed(Breakpoint::Large, Placement::new(5, 0, 4, 1))),
        )));
        let gateway = Arc::new(PersistenceGateway::new(repo, PersistenceSettings::default()));
        let store = ConfigStore::new(gateway);
        store.load("narrow").await.unwrap();
        let edit_mode = EditMode::new();
        edit_mode.enable();
        let engine = GridLayoutEngine::mount(&store, &edit_mode, "narrow", "c1", LARGE).unwrap();
        // w1 does not fit six columns and is only shown elsewhere
        assert_eq!(engine.slot("w1").unwrap().placement, Placement::new(1, 0, 4, 1));

        let outcome = engine.on_gesture_end("a1", Placement::new(5, 0, 1, 1)).unwrap();
        let GestureOutcome::Applied(landed) = outcome else {
            panic!("expected placement, got {outcome:?}");
        };
        assert_ne!(landed, Placement::new(5, 0, 1, 1));

        let doc = store.get("narrow").unwrap();
        let stored: Vec<Placement> = transforms::category(&doc, "c1")
            .unwrap()
            .items
            .iter()
            .filter_map(|i| i.placement_at(Breakpoint::Large))
            .collect();
        assert!(!grid::has_overlap(&stored));
        assert!(!grid::has_overlap(&placements(&engine)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_change_passes_through_syncing() {
        let fx = fixture().await;
        let engine = fx.mount("c2");
        let own = fx.mount("c1");
        let mut transitions = engine.transitions();
        let mut own_transitions = own.transitions();

        fx.store
            .update_config(
                "default",
                |doc| transforms::rename_category(doc, "c2", "Queue"),
                PersistMode::Debounced,
            )
            .unwrap();
        assert_eq!(transitions.try_recv().unwrap(), EngineState::Syncing);
        assert_eq!(transitions.try_recv().unwrap(), EngineState::Bound);
        assert!(transitions.try_recv().is_err());

        // A gesture of its own settles without syncing
        own.on_gesture_end("a2", Placement::new(5, 2, 1, 1)).unwrap();
        assert_eq!(own_transitions.try_recv().unwrap(), EngineState::Syncing);
        assert_eq!(own_transitions.try_recv().unwrap(), EngineState::Bound);
        assert_eq!(own_transitions.try_recv().unwrap(), EngineState::Bound);
        assert_eq!(engine.state(), EngineState::Interactive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collision_unresolved_snaps_back() {
        let fx = fixture().await;
        let engine = fx.mount("c1");
        let before = engine.slots();

        let err = engine.on_gesture_end("w1", Placement::new(0, 0, 9, 1)).unwrap_err();
        assert!(matches!(err, ConfigError::CollisionUnresolved { .. }));
        assert_eq!(engine.slots(), before);
        assert_eq!(fx.store.snapshot("default").unwrap().1, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cross_category_move_is_atomic() {
        let fx = fixture().await;
        let source = fx.mount("c1");
        let dest = fx.mount("c2");

        let owner_counts = Arc::new(Mutex::new(Vec::new()));
        let sink = owner_counts.clone();
        let _watch = fx
            .store
            .subscribe("default", move |change| {
                let owners = change
                    .document
                    .categories
                    .iter()
                    .filter(|c| c.items.iter().any(|i| i.id == "w1"))
                    .count();
                sink.lock().unwrap().push(owners);
            })
            .unwrap();

        let outcome = source.move_to_category("w1", "c2", Placement::new(0, 0, 2, 2)).unwrap();
        assert!(matches!(outcome, GestureOutcome::Applied(_)));

        assert_eq!(*owner_counts.lock().unwrap(), vec![1]);
        assert!(source.slot("w1").is_none());
        assert!(dest.slot("w1").is_some());
        assert_eq!(dest.sync_count(), 1);
        assert_eq!(source.sync_count(), 0);
        assert!(!grid::has_overlap(&placements(&dest)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_add_syncs_without_writing() {
        let fx = fixture().await;
        let engine = fx.mount("c2");
        let other = fx.mount("c1");

        other
            .store
            .update_config(
                "default",
                |doc| transforms::add_item(doc, "c2", Item::widget("w9", "calendar")),
                PersistMode::Debounced,
            )
            .unwrap();

        assert_eq!(engine.sync_count(), 1);
        assert_eq!(engine.state(), EngineState::Interactive);
        let slot = engine.slot("w9").unwrap();
        assert_eq!(slot.placement, Placement::new(1, 0, 1, 1));
        // Auto-placement is view-only
        let doc = fx.store.get("default").unwrap();
        assert!(transforms::find_item(&doc, "w9").unwrap().1.placement.is_empty());
        assert_eq!(fx.store.snapshot("default").unwrap().1, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_category_removed_elsewhere_clears_view() {
        let fx = fixture().await;
        let engine = fx.mount("c2");

        fx.store
            .update_config("default", |doc| transforms::remove_category(doc, "c2"), PersistMode::Immediate)
            .unwrap();

        assert!(engine.slots().is_empty());
        let err = engine.on_gesture_end("a3", Placement::new(1, 1, 1, 1)).unwrap_err();
        assert_eq!(err, ConfigError::category_not_found("c2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewport_switch_does_not_mutate() {
        let fx = fixture().await;
        let engine = fx.mount("c1");

        engine.set_viewport(Breakpoint::Small, 3);

        assert_eq!(engine.container().breakpoint, Breakpoint::Small);
        assert_eq!(engine.slot("a2").unwrap().placement, Placement::new(0, 3, 1, 1));
        assert!(!grid::has_overlap(&placements(&engine)));
        assert_eq!(fx.store.snapshot("default").unwrap().1, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_and_remove_gestures() {
        let fx = fixture().await;
        let engine = fx.mount("c2");

        let outcome = engine.add_item(Item::widget("w5", "rss"), Placement::new(0, 0, 2, 1)).unwrap();
        assert_eq!(outcome, GestureOutcome::Applied(Placement::new(1, 0, 2, 1)));
        assert!(engine.slot("w5").is_some());

        let err = engine.add_item(Item::widget("a1", "dup"), Placement::new(0, 2, 1, 1)).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateId { .. }));

        assert_eq!(engine.remove_item("w5").unwrap(), GestureOutcome::Removed);
        assert!(engine.slot("w5").is_none());

        let err = engine.remove_item("a1").unwrap_err();
        assert_eq!(err, ConfigError::item_not_found("a1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tear_down_releases_subscription() {
        let fx = fixture().await;
        let mut engine = fx.mount("c1");
        let second = fx.mount("c2");
        assert_eq!(fx.store.subscriber_count("default"), 2);

        engine.tear_down();
        assert_eq!(engine.state(), EngineState::TornDown);
        assert_eq!(fx.store.subscriber_count("default"), 1);
        assert_eq!(
            engine.on_gesture_end("a1", Placement::new(0, 4, 1, 1)).unwrap(),
            GestureOutcome::Ignored(IgnoreReason::TornDown)
        );

        drop(second);
        assert_eq!(fx.store.subscriber_count("default"), 0);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Drag { item: usize, x: u32, y: u32 },
        Resize { item: usize, width: u32, height: u32 },
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0..3usize, 0..8u32, 0..6u32).prop_map(|(item, x, y)| Step::Drag { item, x, y }),
            (0..3usize, 1..4u32, 1..4u32).prop_map(|(item, width, height)| Step::Resize { item, width, height }),
        ]
    }

    proptest! {
        #[test]
        fn prop_gestures_never_leave_overlap(steps in proptest::collection::vec(step(), 1..25)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .start_paused(true)
                .build()
                .unwrap();
            let fx = runtime.block_on(fixture());
            let _guard = runtime.enter();
            let engine = fx.mount("c1");
            let ids = ["a1", "w1", "a2"];

            for step in steps {
                let (id, proposed) = match step {
                    Step::Drag { item, x, y } => {
                        let current = engine.slot(ids[item]).unwrap().placement;
                        (ids[item], current.at(x, y))
                    }
                    Step::Resize { item, width, height } => {
                        let current = engine.slot(ids[item]).unwrap().placement;
                        (ids[item], Placement { width, height, ..current })
                    }
                };
                engine.on_gesture_end(id, proposed).unwrap();

                prop_assert!(!grid::has_overlap(&placements(&engine)));
                let doc = fx.store.get("default").unwrap();
                let stored: Vec<Placement> = transforms::category(&doc, "c1")
                    .unwrap()
                    .items
                    .iter()
                    .filter_map(|i| i.placement_at(Breakpoint::Large))
                    .collect();
                prop_assert!(!grid::has_overlap(&stored));
            }
        }
    }
}
