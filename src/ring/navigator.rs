//! Tracks the active ring, the page shown in the tracked tab, and moves
//! that tab through the ring on request.
//!
//! Position is never stored: it is looked up from the current page and the
//! active collection every time it is needed. Icon and panel state are
//! recomputed after every input change and handed to the host only when
//! they differ from what was last handed over.

use super::host::{IconSink, IconState, PanelSink, Tab, TabControl, TabId};
use super::messages::{DataUpdate, PanelMessage, PanelRequest, RingAction};
use super::model::{RingDefinition, RingEntry};
use super::registry::RingRegistry;
use crate::remote::{
    CollectionEvent, FetchConfig, FetchOutcome, ListenerId, PolledRemoteCollection, RemoteSource,
    Topic,
};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::Rng;
use std::future::Future;
use std::sync::{Arc, Weak};
use thiserror::Error;
use url::Url;

/// Placeholder page shown while a tab is between navigations
pub const BLANK_PAGE: &str = "about:blank";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigatorPhase {
    /// No ring selected yet
    Uninitialized,
    /// Ring selected, first fetch or tab lookup still pending
    Loading,
    Ready,
    /// First fetch of the active ring failed
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigatorError {
    #[error("Ring navigator is not ready yet")]
    NotReady,
}

/// Where a ring action sent the tracked tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    pub index: usize,
    pub url: String,
    /// False when there was no tab to drive or the host refused
    pub dispatched: bool,
}

/// Host collaborators the navigator drives
#[derive(Clone)]
pub struct NavigatorHost {
    pub tabs: Arc<dyn TabControl>,
    pub icon: Arc<dyn IconSink>,
    pub panel: Arc<dyn PanelSink>,
}

/// Reduce a page location to origin + path so membership ignores query
/// strings and fragments. Anything without a tuple origin is returned as is.
pub fn sanitize_location(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => {
            let origin = url.origin();
            if origin.is_tuple() {
                format!("{}{}", origin.ascii_serialization(), url.path())
            } else {
                raw.to_string()
            }
        }
        Err(e) => {
            debug!("Failed to sanitize url {:?}: {}", raw, e);
            raw.to_string()
        }
    }
}

/// Index an action moves to, or `None` when it does not apply
pub fn step_index<G: Rng + ?Sized>(
    action: RingAction,
    position: Option<usize>,
    size: usize,
    rng: &mut G,
) -> Option<usize> {
    if size == 0 {
        return None;
    }
    match action {
        RingAction::Back => position.map(|p| if p == 0 { size - 1 } else { p - 1 }),
        RingAction::Next => position.map(|p| if p + 1 >= size { 0 } else { p + 1 }),
        RingAction::Random => Some(rng.gen_range(0..size)),
    }
}

#[derive(Clone)]
pub struct RingNavigator {
    shared: Arc<Shared>,
}

struct Shared {
    registry: RingRegistry,
    host: NavigatorHost,
    source: Arc<dyn RemoteSource>,
    config: FetchConfig,
    state: Mutex<NavigatorState>,
    registry_listener: Mutex<Option<ListenerId>>,
}

struct NavigatorState {
    active_ring_id: Option<String>,
    active_definition: Option<RingDefinition>,
    active: Option<PolledRemoteCollection<RingEntry>>,
    current_page_url: Option<String>,
    tracked_tab: Option<TabId>,
    phase: NavigatorPhase,
    panel_ready: bool,
    preferred_ring: Option<String>,
    // Bumped on every ring switch; stale callbacks compare against it
    generation: u64,
    published_icon: Option<IconState>,
    published_update: Option<DataUpdate>,
}

#[derive(Default)]
struct Effects {
    icon: Option<IconState>,
    update: Option<DataUpdate>,
}

impl RingNavigator {
    pub fn new(
        registry: RingRegistry,
        host: NavigatorHost,
        source: Arc<dyn RemoteSource>,
        config: FetchConfig,
    ) -> Self {
        let navigator = Self {
            shared: Arc::new(Shared {
                registry,
                host,
                source,
                config,
                state: Mutex::new(NavigatorState {
                    active_ring_id: None,
                    active_definition: None,
                    active: None,
                    current_page_url: None,
                    tracked_tab: None,
                    phase: NavigatorPhase::Uninitialized,
                    panel_ready: false,
                    preferred_ring: None,
                    generation: 0,
                    published_icon: None,
                    published_update: None,
                }),
                registry_listener: Mutex::new(None),
            }),
        };

        let weak = Arc::downgrade(&navigator.shared);
        let id = navigator.shared.registry.subscribe(Topic::Change, move |_| {
            if let Some(navigator) = Self::upgrade(&weak) {
                navigator.on_registry_change();
            }
        });
        *navigator.shared.registry_listener.lock() = Some(id);

        navigator
    }

    fn upgrade(weak: &Weak<Shared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    pub fn registry(&self) -> &RingRegistry {
        &self.shared.registry
    }

    /// Select `ring_id` now if the catalog knows it, otherwise as soon as a
    /// catalog refresh brings it in
    pub async fn start(&self, preferred_ring: &str) -> Option<NavigatorPhase> {
        if self.shared.registry.get(preferred_ring).is_some() {
            return self.select_ring(preferred_ring).await;
        }

        info!(
            "Ring '{}' not in catalog yet, selecting once it appears",
            preferred_ring
        );
        self.shared.state.lock().preferred_ring = Some(preferred_ring.to_string());
        None
    }

    /// Switch to `ring_id`. Returns the phase reached once the first fetch
    /// and the tab lookup settled, or `None` when the ring is unknown or a
    /// newer selection superseded this one.
    pub async fn select_ring(&self, ring_id: &str) -> Option<NavigatorPhase> {
        let Some(definition) = self.shared.registry.get(ring_id) else {
            warn!("Cannot select ring: no ring '{}' in the catalog", ring_id);
            return None;
        };

        info!(
            "Selecting ring '{}' from {}",
            definition.id, definition.collection_url
        );
        let collection = self.build_collection(&definition);

        let (generation, effects) = {
            let mut state = self.shared.state.lock();
            if let Some(previous) = state.active.take() {
                previous.dispose();
            }
            state.generation += 1;
            state.active_ring_id = Some(definition.id.clone());
            state.active_definition = Some(definition.clone());
            state.active = Some(collection.clone());
            state.phase = NavigatorPhase::Loading;
            state.preferred_ring = None;
            (state.generation, self.reconcile(&mut state, false))
        };
        self.install_listeners(&collection, generation);
        self.emit(effects);

        let (outcome, tab) = tokio::join!(
            collection.start_watching(),
            self.shared.host.tabs.active_tab()
        );
        let tab = tab.unwrap_or_else(|e| {
            warn!("Failed to look up the active tab: {:#}", e);
            None
        });

        let (phase, effects) = {
            let mut state = self.shared.state.lock();
            if state.generation != generation {
                debug!("Selection of '{}' superseded before it settled", ring_id);
                return None;
            }
            state.phase = Self::phase_for(&outcome);
            if let Some(tab) = tab {
                Self::adopt_tab(&mut state, &tab);
            }
            (state.phase, self.reconcile(&mut state, false))
        };
        self.emit(effects);

        info!("Ring '{}' is {:?}", ring_id, phase);
        Some(phase)
    }

    /// Host reported that a tab became active or changed location
    pub fn on_tab_updated(&self, tab: &Tab) {
        let effects = {
            let mut state = self.shared.state.lock();
            if !Self::adopt_tab(&mut state, tab) {
                return;
            }
            self.reconcile(&mut state, false)
        };
        self.emit(effects);
    }

    /// Move the tracked tab back, forward or to a random ring member
    pub async fn handle_action(
        &self,
        action: RingAction,
    ) -> Result<Option<NavigationTarget>, NavigatorError> {
        let (index, url, tab) = {
            let state = self.shared.state.lock();
            if matches!(
                state.phase,
                NavigatorPhase::Uninitialized | NavigatorPhase::Loading
            ) {
                return Err(NavigatorError::NotReady);
            }
            let Some(active) = state.active.as_ref() else {
                return Err(NavigatorError::NotReady);
            };

            let collection = active.collection();
            let size = collection.len();
            let position = Self::position(&state);
            debug!(
                "Got action request {}, position {:?} of {}",
                action, position, size
            );

            let Some(index) = step_index(action, position, size, &mut rand::thread_rng()) else {
                info!(
                    "Can't go {}: {}",
                    action,
                    if size == 0 {
                        "ring is empty"
                    } else {
                        "current page is not in the ring"
                    }
                );
                return Ok(None);
            };
            let Some(url) = collection.key_at(index) else {
                warn!("No url at ring index {}", index);
                return Ok(None);
            };
            (index, url, state.tracked_tab)
        };

        let dispatched = match tab.filter(|id| id.is_valid()) {
            Some(tab) => {
                info!("Loading ring url {} into tab {}", url, tab);
                match self.shared.host.tabs.navigate(tab, &url, true).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Failed to load ring url {}: {:#}", url, e);
                        false
                    }
                }
            }
            None => {
                warn!("No tracked tab to load {} into", url);
                false
            }
        };

        Ok(Some(NavigationTarget {
            index,
            url,
            dispatched,
        }))
    }

    /// Dispatch one message from the presentation layer
    pub async fn on_message(&self, request: PanelRequest) -> Result<(), NavigatorError> {
        match request {
            PanelRequest::PanelReady => {
                let effects = {
                    let mut state = self.shared.state.lock();
                    state.panel_ready = true;
                    self.reconcile(&mut state, true)
                };
                self.emit(effects);
                Ok(())
            }
            PanelRequest::RingAction(action) => self.handle_action(action).await.map(|_| ()),
            PanelRequest::RingRequest(ring_id) => {
                self.select_ring(&ring_id).await;
                Ok(())
            }
        }
    }

    /// Stop polling the active ring and stop following the catalog
    pub fn shutdown(&self) {
        if let Some(id) = self.shared.registry_listener.lock().take() {
            self.shared.registry.unsubscribe(Topic::Change, id);
        }
        let mut state = self.shared.state.lock();
        if let Some(active) = state.active.take() {
            active.dispose();
        }
        state.generation += 1;
    }

    pub fn phase(&self) -> NavigatorPhase {
        self.shared.state.lock().phase
    }

    pub fn active_ring_id(&self) -> Option<String> {
        self.shared.state.lock().active_ring_id.clone()
    }

    /// Handle to the live ring collection
    pub fn active_collection(&self) -> Option<PolledRemoteCollection<RingEntry>> {
        self.shared.state.lock().active.clone()
    }

    pub fn current_page_url(&self) -> Option<String> {
        self.shared.state.lock().current_page_url.clone()
    }

    pub fn tracked_tab(&self) -> Option<TabId> {
        self.shared.state.lock().tracked_tab
    }

    pub fn current_position(&self) -> Option<usize> {
        Self::position(&self.shared.state.lock())
    }

    pub fn icon_state(&self) -> IconState {
        Self::derive_icon(&self.shared.state.lock())
    }

    pub fn data_update(&self) -> DataUpdate {
        self.build_update(&self.shared.state.lock())
    }

    fn build_collection(&self, definition: &RingDefinition) -> PolledRemoteCollection<RingEntry> {
        self.shared.registry.collection_for(
            definition,
            Arc::clone(&self.shared.source),
            &self.shared.config,
        )
    }

    fn install_listeners(&self, collection: &PolledRemoteCollection<RingEntry>, generation: u64) {
        let weak = Arc::downgrade(&self.shared);
        collection.on_change(move |_| {
            if let Some(navigator) = Self::upgrade(&weak) {
                navigator.on_collection_change(generation);
            }
        });

        let weak = Arc::downgrade(&self.shared);
        collection.subscribe(Topic::Settled, move |event| {
            if let (Some(navigator), CollectionEvent::Settled(outcome)) =
                (Self::upgrade(&weak), event)
            {
                navigator.on_collection_settled(generation, outcome);
            }
        });
    }

    fn on_collection_change(&self, generation: u64) {
        let effects = {
            let mut state = self.shared.state.lock();
            if state.generation != generation {
                return;
            }
            debug!("Active ring data changed, reconciling");
            self.reconcile(&mut state, false)
        };
        self.emit(effects);
    }

    fn on_collection_settled(&self, generation: u64, outcome: &FetchOutcome) {
        let effects = {
            let mut state = self.shared.state.lock();
            if state.generation != generation {
                return;
            }
            // The initial fetch is settled by select_ring together with the tab lookup
            if state.phase != NavigatorPhase::Loading {
                state.phase = Self::phase_for(outcome);
            }
            self.reconcile(&mut state, false)
        };
        self.emit(effects);
    }

    fn on_registry_change(&self) {
        let mut follow_up: Option<FollowUp> = None;
        let effects = {
            let mut state = self.shared.state.lock();
            match (state.active_ring_id.clone(), state.active_definition.clone()) {
                (None, _) => {
                    if let Some(ring_id) = state.preferred_ring.clone() {
                        if self.shared.registry.get(&ring_id).is_some() {
                            state.preferred_ring = None;
                            follow_up = Some(FollowUp::Select(ring_id));
                        }
                    }
                }
                (Some(ring_id), Some(current)) => match self.shared.registry.get(&ring_id) {
                    Some(updated) if updated.collection_url != current.collection_url => {
                        info!("Ring '{}' moved to {}", ring_id, updated.collection_url);
                        follow_up = Some(FollowUp::Select(ring_id));
                    }
                    Some(updated) if updated.data_refresh_seconds != current.data_refresh_seconds => {
                        follow_up = Some(FollowUp::Interval(updated.data_refresh_seconds));
                        state.active_definition = Some(updated);
                    }
                    Some(_) => {}
                    None => warn!("Active ring '{}' left the catalog", ring_id),
                },
                (Some(_), None) => {}
            }
            self.reconcile(&mut state, false)
        };
        self.emit(effects);

        match follow_up {
            Some(FollowUp::Select(ring_id)) => {
                let navigator = self.clone();
                spawn_detached(async move {
                    navigator.select_ring(&ring_id).await;
                });
            }
            Some(FollowUp::Interval(seconds)) => {
                if let Some(active) = self.active_collection() {
                    spawn_detached(async move {
                        active.set_refresh_interval(seconds).await;
                    });
                }
            }
            None => {}
        }
    }

    /// Record the tab as tracked and take its location; returns whether the
    /// current page changed
    fn adopt_tab(state: &mut NavigatorState, tab: &Tab) -> bool {
        let Some(id) = tab.id.filter(|id| id.is_valid()) else {
            debug!("Ignoring update for a tab without id");
            return false;
        };
        state.tracked_tab = Some(id);

        let Some(raw) = tab.url.as_deref().filter(|u| !u.is_empty()) else {
            return false;
        };
        let url = sanitize_location(raw);
        if url == BLANK_PAGE {
            debug!("Ignoring blank page in tab {}", id);
            return false;
        }
        if state.current_page_url.as_deref() == Some(url.as_str()) {
            return false;
        }

        debug!(
            "Current page was {:?}, now {} (from {})",
            state.current_page_url, url, raw
        );
        state.current_page_url = Some(url);
        true
    }

    fn phase_for(outcome: &FetchOutcome) -> NavigatorPhase {
        if outcome.is_success() {
            NavigatorPhase::Ready
        } else {
            NavigatorPhase::Error
        }
    }

    fn position(state: &NavigatorState) -> Option<usize> {
        let active = state.active.as_ref()?;
        let url = state.current_page_url.as_deref()?;
        active.collection().position_of(url)
    }

    fn derive_icon(state: &NavigatorState) -> IconState {
        let failed = state
            .active
            .as_ref()
            .is_some_and(|active| active.collection().last_error().is_some());
        if failed {
            IconState::Error
        } else if Self::position(state).is_some() {
            IconState::InRing
        } else {
            IconState::Default
        }
    }

    fn build_update(&self, state: &NavigatorState) -> DataUpdate {
        let entries_list: Vec<RingEntry> = state
            .active
            .as_ref()
            .map(|active| active.collection().entries().values().cloned().collect())
            .unwrap_or_default();

        DataUpdate {
            ring_url_count: entries_list.len(),
            entries_list,
            rings_by_id: (*self.shared.registry.definitions()).clone(),
            ring_url_index: Self::position(state).map_or(-1, |p| p as i64),
            current_ring_id: state.active_ring_id.clone(),
        }
    }

    /// Recompute derived state; returns only what differs from what the
    /// host last received
    fn reconcile(&self, state: &mut NavigatorState, force_update: bool) -> Effects {
        let mut effects = Effects::default();

        let icon = Self::derive_icon(state);
        if state.published_icon != Some(icon) {
            state.published_icon = Some(icon);
            effects.icon = Some(icon);
        }

        if state.panel_ready {
            let update = self.build_update(state);
            if force_update || state.published_update.as_ref() != Some(&update) {
                state.published_update = Some(update.clone());
                effects.update = Some(update);
            }
        }

        effects
    }

    fn emit(&self, effects: Effects) {
        if let Some(icon) = effects.icon {
            debug!("Icon state -> {}", icon);
            self.shared.host.icon.set_icon(icon);
        }
        if let Some(update) = effects.update {
            self.shared.host.panel.send(PanelMessage::DataUpdate(update));
        }
    }
}

enum FollowUp {
    Select(String),
    Interval(Option<u64>),
}

fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(future);
        }
        Err(_) => warn!("No async runtime available for ring follow-up work"),
    }
}
