//! Dashboard lifecycle: source selection, loading, partition refresh and
//! persistence of the current document.

use super::document::DashboardDocument;
use super::route::{DashboardSources, LoadSource, Navigation};
use super::share::ShareLink;
use super::timers::{TimerId, Timers};
use crate::consts::dash_consts::{ALL, REFRESH_CHANNEL};
use crate::events::{Address, EventBus, ListenerId};
use crate::index::{IndexError, IndexExpander, Interval};
use crate::registry::{FilterEntity, QueryEntity, RangeMode, Registry};
use crate::store::{DashboardSummary, DocKind, SaveReceipt, StoreError};
use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Buffer of the controller's command channel.
const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("No dashboard is loaded")]
    NotLoaded,

    #[error("A dashboard needs a title to be saved")]
    MissingTitle,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Invalid dashboard document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, strum::Display)]
pub enum LifecycleState {
    Unloaded,
    Loading,
    Loaded,
}

/// Messages delivered to the controller by its own timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerCommand {
    Refresh { generation: u64 },
}

/// A navigation whose document is still being fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLoad {
    pub generation: u64,
    pub source: LoadSource,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// A later navigation or load replaced this one; its result was dropped.
    Superseded,
}

pub struct DashboardController {
    bus: EventBus,
    listener: ListenerId,
    expander: IndexExpander,
    sources: DashboardSources,
    state: LifecycleState,
    current: Option<DashboardDocument>,
    indices: Vec<String>,
    generation: u64,
    timers: Timers,
    commands: mpsc::Sender<ControllerCommand>,
}

impl DashboardController {
    /// Creates an unloaded controller and the receiving end of its command
    /// channel. Feed received commands back through [`Self::handle`].
    pub fn new(
        bus: EventBus,
        expander: IndexExpander,
        sources: DashboardSources,
    ) -> (Self, mpsc::Receiver<ControllerCommand>) {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let listener = bus.allocate_listener_id();
        let controller = Self {
            bus,
            listener,
            expander,
            sources,
            state: LifecycleState::Unloaded,
            current: None,
            indices: Vec::new(),
            generation: 0,
            timers: Timers::new(),
            commands,
        };
        (controller, receiver)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn listener_id(&self) -> ListenerId {
        self.listener
    }

    pub fn sources(&self) -> &DashboardSources {
        &self.sources
    }

    pub fn current(&self) -> Option<&DashboardDocument> {
        self.current.as_ref()
    }

    /// Active partition set.
    pub fn indices(&self) -> &[String] {
        &self.indices
    }

    pub fn queries(&self) -> Option<&Registry<QueryEntity>> {
        self.current.as_ref().map(|doc| &doc.services.query)
    }

    pub fn queries_mut(&mut self) -> Option<&mut Registry<QueryEntity>> {
        self.current.as_mut().map(|doc| &mut doc.services.query)
    }

    pub fn filters(&self) -> Option<&Registry<FilterEntity>> {
        self.current.as_ref().map(|doc| &doc.services.filter)
    }

    pub fn filters_mut(&mut self) -> Option<&mut Registry<FilterEntity>> {
        self.current.as_mut().map(|doc| &mut doc.services.filter)
    }

    /// Starts a navigation: picks the source and discards the current
    /// document. The returned load must be finished with
    /// [`Self::complete_navigation`].
    pub fn begin_navigation(&mut self, navigation: &Navigation) -> PendingLoad {
        let source = self.sources.select(navigation);
        self.generation += 1;
        self.state = LifecycleState::Loading;
        self.current = None;
        self.indices.clear();
        log::debug!(
            "navigation {} loading from {:?}",
            self.generation,
            source
        );
        PendingLoad {
            generation: self.generation,
            source,
        }
    }

    /// Applies the fetched document of a navigation, unless something newer
    /// has started since.
    pub async fn complete_navigation(
        &mut self,
        generation: u64,
        fetched: Result<Value, StoreError>,
    ) -> Result<LoadOutcome, DashboardError> {
        if generation != self.generation {
            log::debug!(
                "dropping result of navigation {} (current is {})",
                generation,
                self.generation
            );
            return Ok(LoadOutcome::Superseded);
        }

        let document = match fetched {
            Ok(value) => DashboardDocument::from_value_with_defaults(value),
            Err(e) => {
                self.state = LifecycleState::Unloaded;
                return Err(e.into());
            }
        };
        match document {
            Ok(document) => {
                self.load(document).await?;
                Ok(LoadOutcome::Loaded)
            }
            Err(e) => {
                self.state = LifecycleState::Unloaded;
                Err(e.into())
            }
        }
    }

    /// Selects, fetches and loads in one go.
    pub async fn navigate(&mut self, navigation: &Navigation) -> Result<LoadOutcome, DashboardError> {
        let pending = self.begin_navigation(navigation);
        let fetched = self.sources.fetch(&pending.source).await;
        self.complete_navigation(pending.generation, fetched).await
    }

    /// Makes `document` the current dashboard.
    ///
    /// Cancels the previous dashboard's timers and re-binds both registries.
    /// A time-sliced index without any time filter is refreshed right away.
    pub async fn load(&mut self, mut document: DashboardDocument) -> Result<(), DashboardError> {
        self.timers.cancel_all();
        self.generation += 1;

        if document.index.interval == Interval::None {
            self.indices = vec![document.index.default.clone()];
        }

        document.services.query.init();
        document.services.filter.init();

        let needs_refresh = document.index.interval.is_time_based()
            && document.services.filter.ids_by_type("time", false).is_empty();

        log::info!(
            "Loaded dashboard '{}' ({} queries, {} filters)",
            document.title,
            document.services.query.len(),
            document.services.filter.len()
        );
        self.current = Some(document);
        self.state = LifecycleState::Loaded;

        if needs_refresh {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Recomputes the active partitions and tells every panel to refresh.
    ///
    /// A catalog failure is returned without broadcasting and leaves the
    /// previous partition set in place.
    pub async fn refresh(&mut self) -> Result<(), DashboardError> {
        let document = self.current.as_ref().ok_or(DashboardError::NotLoaded)?;
        let index = document.index.clone();
        let window = document.services.filter.time_range(RangeMode::Min);

        let indices = match (index.interval.is_time_based(), window) {
            (true, Some(window)) => {
                let resolved = self
                    .expander
                    .resolve(window.from, window.to, &index.pattern, index.interval)
                    .await?;
                if resolved.is_empty() {
                    vec![index.default]
                } else {
                    resolved
                }
            }
            _ => vec![index.default],
        };

        log::debug!("active partitions: {:?}", indices);
        self.indices = indices;
        self.bus
            .broadcast(self.listener, Address::group(ALL), REFRESH_CHANNEL, Value::Null);
        Ok(())
    }

    /// Schedules a refresh of the current dashboard after `delay`. The timer
    /// dies with the next load.
    pub fn schedule_refresh(&mut self, delay: Duration) -> TimerId {
        let command = ControllerCommand::Refresh {
            generation: self.generation,
        };
        self.timers.schedule(delay, self.commands.clone(), command)
    }

    /// Cancels one pending timer. `false` if it already fired or was
    /// cancelled.
    pub fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.timers.cancel(id)
    }

    pub fn active_timers(&self) -> usize {
        self.timers.active()
    }

    /// Executes a command from the controller's channel. Returns `false` when
    /// the command belonged to a dashboard that is no longer current.
    pub async fn handle(&mut self, command: ControllerCommand) -> Result<bool, DashboardError> {
        match command {
            ControllerCommand::Refresh { generation } => {
                if generation != self.generation || self.state != LifecycleState::Loaded {
                    log::debug!("ignoring stale refresh from generation {}", generation);
                    return Ok(false);
                }
                self.refresh().await?;
                Ok(true)
            }
        }
    }

    /// Deep copy of the current document.
    pub fn snapshot(&self) -> Result<DashboardDocument, DashboardError> {
        self.current.clone().ok_or(DashboardError::NotLoaded)
    }

    /// Saves a copy of the current dashboard. `Dashboard` documents are keyed
    /// by title, overridden by `title` when given.
    pub async fn save_to_store(
        &self,
        kind: DocKind,
        title: Option<&str>,
        ttl: Option<String>,
    ) -> Result<SaveReceipt, DashboardError> {
        let mut snapshot = self.snapshot()?;
        if kind == DocKind::Dashboard {
            if let Some(title) = title {
                snapshot.title = title.to_string();
            }
            if snapshot.title.trim().is_empty() {
                return Err(DashboardError::MissingTitle);
            }
        }
        let value = snapshot.to_value()?;
        Ok(self
            .sources
            .store
            .save(kind, &snapshot.title, &value, ttl)
            .await?)
    }

    pub async fn delete_from_store(&self, id: &str) -> Result<(), DashboardError> {
        Ok(self.sources.store.delete(id).await?)
    }

    pub async fn list_from_store(
        &self,
        query: &str,
        count: usize,
    ) -> Result<Vec<DashboardSummary>, DashboardError> {
        Ok(self.sources.store.list(query, count).await?)
    }

    /// Writes the current dashboard as pretty JSON to
    /// `<dir>/<title>-<unix millis>.json`.
    pub fn export_to_file(&self, dir: &Path) -> Result<PathBuf, DashboardError> {
        let snapshot = self.snapshot()?;
        let stem: String = snapshot
            .title
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        let path = dir.join(format!("{}-{}.json", stem, Utc::now().timestamp_millis()));
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::create_dir_all(dir)?;
        std::fs::write(&path, json)?;
        log::info!("Exported dashboard to {}", path.display());
        Ok(path)
    }

    /// Stores `document`, or the current dashboard, in the local storage
    /// slot. `false` when local storage is unavailable.
    pub fn set_default(&self, document: Option<&DashboardDocument>) -> Result<bool, DashboardError> {
        if !self.sources.local.is_available() {
            return Ok(false);
        }
        let json = match document {
            Some(document) => serde_json::to_string(document)?,
            None => serde_json::to_string(self.current.as_ref().ok_or(DashboardError::NotLoaded)?)?,
        };
        self.sources.local.write(&json)?;
        Ok(true)
    }

    /// Blanks the local storage slot. `false` when local storage is
    /// unavailable.
    pub fn purge_default(&self) -> Result<bool, DashboardError> {
        if !self.sources.local.is_available() {
            return Ok(false);
        }
        self.sources.local.write("")?;
        Ok(true)
    }

    pub fn share_link(&self, location: &str, kind: &str, id: &str) -> ShareLink {
        let title = self.current.as_ref().map_or("", |doc| doc.title.as_str());
        ShareLink::new(location, kind, id, title)
    }

    /// Publishes a copy of `document`, or of the current dashboard, as a gist
    /// and returns its URL.
    pub async fn save_gist(
        &self,
        title: Option<&str>,
        document: Option<&DashboardDocument>,
    ) -> Result<String, DashboardError> {
        let mut snapshot = match document {
            Some(document) => document.clone(),
            None => self.snapshot()?,
        };
        if let Some(title) = title {
            snapshot.title = title.to_string();
        }
        let value = snapshot.to_value()?;
        Ok(self.sources.gist.save(&snapshot.title, &value).await?)
    }

    /// Dashboards stored in gist `id`.
    pub async fn gist_dashboards(&self, id: &str) -> Result<Vec<Value>, DashboardError> {
        Ok(self.sources.gist.list(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Listener;
    use crate::index::catalog::MockPartitionCatalog;
    use crate::registry::{FilterKind, FilterPatch, QueryPatch};
    use crate::store::MockDashboardStore;
    use crate::store::files::MockDashboardFiles;
    use crate::store::gist::MockGistService;
    use crate::store::local::MockLocalStorage;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn sources(
        store: MockDashboardStore,
        files: MockDashboardFiles,
        local: MockLocalStorage,
    ) -> DashboardSources {
        DashboardSources {
            store: Arc::new(store),
            files: Arc::new(files),
            local: Arc::new(local),
            gist: Arc::new(MockGistService::new()),
        }
    }

    fn no_local() -> MockLocalStorage {
        let mut local = MockLocalStorage::new();
        local.expect_is_available().return_const(false);
        local
    }

    fn idle_sources() -> DashboardSources {
        sources(MockDashboardStore::new(), MockDashboardFiles::new(), no_local())
    }

    fn catalog_never_called() -> IndexExpander {
        let mut catalog = MockPartitionCatalog::new();
        catalog.expect_list_partitions().never();
        IndexExpander::new(Arc::new(catalog))
    }

    fn catalog_with(names: &[&str]) -> IndexExpander {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let mut catalog = MockPartitionCatalog::new();
        catalog
            .expect_list_partitions()
            .returning(move || Ok(names.clone()));
        IndexExpander::new(Arc::new(catalog))
    }

    fn document(interval: &str) -> DashboardDocument {
        DashboardDocument::from_value_with_defaults(json!({
            "title": "Ops",
            "index": {"interval": interval, "pattern": "[idx-]YYYY.MM.DD", "default": "fallback"},
        }))
        .unwrap()
    }

    fn count_refreshes(bus: &EventBus) -> (Arc<AtomicUsize>, crate::events::Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let panel = Listener::new(bus.allocate_listener_id());
        let subscription = bus.register(&panel, REFRESH_CHANNEL, move |_, _, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, subscription)
    }

    fn time_filter(from_day: u32, to_day: u32) -> FilterPatch {
        FilterPatch::kind(FilterKind::time(
            Utc.with_ymd_and_hms(2023, 1, from_day, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, to_day, 0, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    // A dashboard without time slicing reads its default partition only.
    async fn test_load_without_interval_uses_default_partition() {
        let bus = EventBus::new();
        let (count, _subscription) = count_refreshes(&bus);
        let (mut controller, _rx) =
            DashboardController::new(bus, catalog_never_called(), idle_sources());

        controller.load(document("none")).await.unwrap();

        assert_eq!(controller.state(), LifecycleState::Loaded);
        assert_eq!(controller.indices(), ["fallback"]);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        // The query registry is seeded on load.
        assert_eq!(controller.queries().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_time_based_load_without_time_filter_refreshes() {
        let bus = EventBus::new();
        let (count, _subscription) = count_refreshes(&bus);
        let (mut controller, _rx) =
            DashboardController::new(bus, catalog_never_called(), idle_sources());

        controller.load(document("day")).await.unwrap();

        assert_eq!(controller.indices(), ["fallback"]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_resolves_time_filter_window() {
        let bus = EventBus::new();
        let (count, _subscription) = count_refreshes(&bus);
        let expander = catalog_with(&["idx-2023.01.01", "idx-2023.01.02", "idx-2023.01.04"]);
        let (mut controller, _rx) = DashboardController::new(bus, expander, idle_sources());

        let mut doc = document("day");
        doc.services.filter.set(time_filter(1, 3), None).unwrap();
        controller.load(doc).await.unwrap();
        // A time filter is present, so loading alone does not refresh.
        assert_eq!(count.load(Ordering::SeqCst), 0);

        controller.refresh().await.unwrap();
        assert_eq!(controller.indices(), ["idx-2023.01.02", "idx-2023.01.01"]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_with_no_matching_partitions_uses_default() {
        let bus = EventBus::new();
        let (mut controller, _rx) =
            DashboardController::new(bus, catalog_with(&["other"]), idle_sources());
        let mut doc = document("day");
        doc.services.filter.set(time_filter(1, 3), None).unwrap();
        controller.load(doc).await.unwrap();

        controller.refresh().await.unwrap();
        assert_eq!(controller.indices(), ["fallback"]);
    }

    #[tokio::test]
    // Catalog failures surface and nothing is broadcast.
    async fn test_refresh_catalog_failure_keeps_partitions() {
        let bus = EventBus::new();
        let (count, _subscription) = count_refreshes(&bus);
        let mut catalog = MockPartitionCatalog::new();
        catalog.expect_list_partitions().returning(|| {
            Err(crate::network::HttpError::Http {
                status: 503,
                message: String::new(),
            })
        });
        let (mut controller, _rx) = DashboardController::new(
            bus,
            IndexExpander::new(Arc::new(catalog)),
            idle_sources(),
        );
        let mut doc = document("day");
        doc.services.filter.set(time_filter(1, 3), None).unwrap();
        controller.load(doc).await.unwrap();

        assert!(matches!(
            controller.refresh().await,
            Err(DashboardError::Index(IndexError::Catalog(_)))
        ));
        assert!(controller.indices().is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_before_load_is_an_error() {
        let (mut controller, _rx) =
            DashboardController::new(EventBus::new(), catalog_never_called(), idle_sources());
        assert!(matches!(
            controller.refresh().await,
            Err(DashboardError::NotLoaded)
        ));
    }

    #[tokio::test]
    async fn test_navigate_loads_file_with_defaults() {
        let mut files = MockDashboardFiles::new();
        files
            .expect_fetch()
            .withf(|name| name == "logs.json")
            .returning(|_| Ok(json!({"title": "Logs"})));
        let (mut controller, _rx) = DashboardController::new(
            EventBus::new(),
            catalog_never_called(),
            sources(MockDashboardStore::new(), files, no_local()),
        );

        let outcome = controller
            .navigate(&Navigation::to("file", "logs.json"))
            .await
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded);
        let current = controller.current().unwrap();
        assert_eq!(current.title, "Logs");
        assert!(current.editable);
        assert_eq!(controller.indices(), ["_all"]);
    }

    #[tokio::test]
    async fn test_navigate_failure_leaves_controller_unloaded() {
        let mut store = MockDashboardStore::new();
        store.expect_load().returning(|kind, id| {
            Err(StoreError::NotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            })
        });
        let (mut controller, _rx) = DashboardController::new(
            EventBus::new(),
            catalog_never_called(),
            sources(store, MockDashboardFiles::new(), no_local()),
        );

        let result = controller
            .navigate(&Navigation::to("elasticsearch", "gone"))
            .await;
        assert!(matches!(result, Err(DashboardError::Store(_))));
        assert_eq!(controller.state(), LifecycleState::Unloaded);
        assert!(controller.current().is_none());
    }

    #[tokio::test]
    // The slower of two overlapping navigations must not win.
    async fn test_stale_navigation_result_is_superseded() {
        let (mut controller, _rx) =
            DashboardController::new(EventBus::new(), catalog_never_called(), idle_sources());

        let first = controller.begin_navigation(&Navigation::to("file", "a.json"));
        let second = controller.begin_navigation(&Navigation::to("file", "b.json"));

        let outcome = controller
            .complete_navigation(second.generation, Ok(json!({"title": "B"})))
            .await
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded);

        let outcome = controller
            .complete_navigation(first.generation, Ok(json!({"title": "A"})))
            .await
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Superseded);
        assert_eq!(controller.current().unwrap().title, "B");
    }

    #[tokio::test]
    async fn test_begin_navigation_clears_current_document() {
        let (mut controller, _rx) =
            DashboardController::new(EventBus::new(), catalog_never_called(), idle_sources());
        controller.load(document("none")).await.unwrap();

        let pending = controller.begin_navigation(&Navigation::home());
        assert_eq!(pending.source, LoadSource::default_file());
        assert_eq!(controller.state(), LifecycleState::Loading);
        assert!(controller.current().is_none());
        assert!(controller.indices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_refresh_runs_for_current_dashboard() {
        let bus = EventBus::new();
        let (count, _subscription) = count_refreshes(&bus);
        let (mut controller, mut rx) =
            DashboardController::new(bus, catalog_never_called(), idle_sources());
        controller.load(document("none")).await.unwrap();

        controller.schedule_refresh(Duration::from_secs(30));
        let command = rx.recv().await.unwrap();
        assert!(controller.handle(command).await.unwrap());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    // Cancelling one timer leaves the others running.
    async fn test_cancel_single_timer() {
        let (mut controller, mut rx) =
            DashboardController::new(EventBus::new(), catalog_never_called(), idle_sources());
        controller.load(document("none")).await.unwrap();
        let early = controller.schedule_refresh(Duration::from_secs(10));
        let late = controller.schedule_refresh(Duration::from_secs(20));

        assert!(controller.cancel_timer(early));
        assert!(!controller.cancel_timer(early));
        assert_eq!(controller.active_timers(), 1);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(rx.try_recv().is_err());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_ok());
        assert!(!controller.cancel_timer(late));
    }

    #[tokio::test(start_paused = true)]
    // Loading another dashboard cancels the timers of the previous one.
    async fn test_load_cancels_previous_timers() {
        let (mut controller, mut rx) =
            DashboardController::new(EventBus::new(), catalog_never_called(), idle_sources());
        controller.load(document("none")).await.unwrap();
        controller.schedule_refresh(Duration::from_secs(30));
        assert_eq!(controller.active_timers(), 1);

        controller.load(document("none")).await.unwrap();
        assert_eq!(controller.active_timers(), 0);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_refresh_command_is_ignored() {
        let (mut controller, _rx) =
            DashboardController::new(EventBus::new(), catalog_never_called(), idle_sources());
        controller.load(document("none")).await.unwrap();
        let stale = ControllerCommand::Refresh {
            generation: controller.generation() - 1,
        };
        assert!(!controller.handle(stale).await.unwrap());
    }

    #[tokio::test]
    async fn test_registries_are_reset_on_load() {
        let (mut controller, _rx) =
            DashboardController::new(EventBus::new(), catalog_never_called(), idle_sources());
        controller.load(document("none")).await.unwrap();
        controller
            .queries_mut()
            .unwrap()
            .set(QueryPatch::query("status:500"), None)
            .unwrap();
        assert_eq!(controller.queries().unwrap().len(), 2);

        controller.load(document("none")).await.unwrap();
        assert_eq!(controller.queries().unwrap().len(), 1);
        assert!(controller.filters().unwrap().is_empty());
    }

    #[tokio::test]
    // Saving works on a copy; the loaded document keeps its title.
    async fn test_save_overrides_title_on_snapshot_only() {
        let mut store = MockDashboardStore::new();
        store
            .expect_save()
            .withf(|kind, title, dashboard, ttl| {
                *kind == DocKind::Dashboard
                    && title == "Renamed"
                    && dashboard["title"] == "Renamed"
                    && ttl.is_none()
            })
            .returning(|kind, title, _, _| {
                Ok(SaveReceipt {
                    id: title.to_string(),
                    kind,
                })
            });
        let (mut controller, _rx) = DashboardController::new(
            EventBus::new(),
            catalog_never_called(),
            sources(store, MockDashboardFiles::new(), no_local()),
        );
        controller.load(document("none")).await.unwrap();

        let receipt = controller
            .save_to_store(DocKind::Dashboard, Some("Renamed"), None)
            .await
            .unwrap();
        assert_eq!(receipt.id, "Renamed");
        assert_eq!(controller.current().unwrap().title, "Ops");
    }

    #[tokio::test]
    async fn test_temp_save_passes_ttl() {
        let mut store = MockDashboardStore::new();
        store
            .expect_save()
            .withf(|kind, _, _, ttl| *kind == DocKind::Temp && ttl.as_deref() == Some("30d"))
            .returning(|kind, _, _, _| {
                Ok(SaveReceipt {
                    id: "AbC123".to_string(),
                    kind,
                })
            });
        let (mut controller, _rx) = DashboardController::new(
            EventBus::new(),
            catalog_never_called(),
            sources(store, MockDashboardFiles::new(), no_local()),
        );
        controller.load(document("none")).await.unwrap();

        let receipt = controller
            .save_to_store(DocKind::Temp, None, Some("30d".to_string()))
            .await
            .unwrap();
        assert_eq!(receipt.id, "AbC123");
    }

    #[tokio::test]
    async fn test_untitled_dashboard_cannot_be_saved() {
        let (mut controller, _rx) =
            DashboardController::new(EventBus::new(), catalog_never_called(), idle_sources());
        controller
            .load(DashboardDocument::default())
            .await
            .unwrap();
        assert!(matches!(
            controller.save_to_store(DocKind::Dashboard, None, None).await,
            Err(DashboardError::MissingTitle)
        ));
    }

    #[tokio::test]
    async fn test_default_slot_round_trip() {
        let written = Arc::new(Mutex::new(Vec::<String>::new()));
        let log = written.clone();
        let mut local = MockLocalStorage::new();
        local.expect_is_available().return_const(true);
        local.expect_write().returning(move |contents| {
            log.lock().unwrap().push(contents.to_string());
            Ok(())
        });
        let (mut controller, _rx) = DashboardController::new(
            EventBus::new(),
            catalog_never_called(),
            sources(MockDashboardStore::new(), MockDashboardFiles::new(), local),
        );
        controller.load(document("none")).await.unwrap();

        assert!(controller.set_default(None).unwrap());
        assert!(controller.purge_default().unwrap());

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 2);
        let stored: Value = serde_json::from_str(&written[0]).unwrap();
        assert_eq!(stored["title"], "Ops");
        assert_eq!(written[1], "");
    }

    #[tokio::test]
    async fn test_unavailable_local_storage_reports_false() {
        let (mut controller, _rx) =
            DashboardController::new(EventBus::new(), catalog_never_called(), idle_sources());
        controller.load(document("none")).await.unwrap();
        assert!(!controller.set_default(None).unwrap());
        assert!(!controller.purge_default().unwrap());
    }

    #[tokio::test]
    async fn test_export_writes_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, _rx) =
            DashboardController::new(EventBus::new(), catalog_never_called(), idle_sources());
        controller.load(document("none")).await.unwrap();

        let path = controller.export_to_file(dir.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("Ops-") && name.ends_with(".json"));
        let exported: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(exported["index"]["default"], "fallback");
    }

    #[tokio::test]
    async fn test_share_link_uses_current_title() {
        let (mut controller, _rx) =
            DashboardController::new(EventBus::new(), catalog_never_called(), idle_sources());
        controller.load(document("none")).await.unwrap();
        let share = controller.share_link("http://host/#/old", "temp", "xyz");
        assert_eq!(share.link, "http://host/#dashboard/temp/xyz");
        assert_eq!(share.title, "Ops");
    }

    #[tokio::test]
    async fn test_save_gist_uses_given_title() {
        let mut gist = MockGistService::new();
        gist.expect_save()
            .withf(|title, dashboard| title == "Shared" && dashboard["title"] == "Shared")
            .returning(|_, _| Ok("https://gist.github.com/someone/abcdef12345".to_string()));
        let sources = DashboardSources {
            gist: Arc::new(gist),
            ..idle_sources()
        };
        let (mut controller, _rx) =
            DashboardController::new(EventBus::new(), catalog_never_called(), sources);
        controller.load(document("none")).await.unwrap();

        let url = controller.save_gist(Some("Shared"), None).await.unwrap();
        assert!(url.ends_with("abcdef12345"));
    }

    #[tokio::test]
    // An explicit document is published as-is and needs no loaded dashboard.
    async fn test_save_gist_with_explicit_document() {
        let mut gist = MockGistService::new();
        gist.expect_save()
            .withf(|title, dashboard| title == "Other" && dashboard["index"]["interval"] == "day")
            .returning(|_, _| Ok("https://gist.github.com/someone/0123456789".to_string()));
        let sources = DashboardSources {
            gist: Arc::new(gist),
            ..idle_sources()
        };
        let (controller, _rx) =
            DashboardController::new(EventBus::new(), catalog_never_called(), sources);

        let mut other = document("day");
        other.title = "Other".to_string();
        let url = controller.save_gist(None, Some(&other)).await.unwrap();
        assert!(url.ends_with("0123456789"));
        assert!(matches!(
            controller.save_gist(None, None).await,
            Err(DashboardError::NotLoaded)
        ));
    }
}
