//! Ordered key → record mapping populated from a remote JSON document
//!
//! A collection owns exactly one source location and runs one
//! fetch-parse-populate cycle per `fetch_data` call. Failures never touch
//! the current entries; they are recorded and published instead.

use super::error::FetchError;
use super::events::{EventTopicBus, ListenerId, Topic};
use super::logging::FetchLogger;
use super::source::{RemoteSource, resolve_location};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{debug, warn};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Records a collection can hold
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Record for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Entries in document order
pub type Entries<R> = IndexMap<String, R>;

/// Result of one completed fetch cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The document was parsed and now holds this many entries
    Populated(usize),
    /// The cycle failed and the previous entries were kept
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Populated(_))
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            FetchOutcome::Failed(e) => Some(e),
            FetchOutcome::Populated(_) => None,
        }
    }
}

/// Payload published on a collection's topics
#[derive(Debug, Clone)]
pub enum CollectionEvent<R> {
    Error(FetchError),
    Change(Arc<Entries<R>>),
    Settled(FetchOutcome),
}

impl<R> CollectionEvent<R> {
    pub fn topic(&self) -> Topic {
        match self {
            CollectionEvent::Error(_) => Topic::Error,
            CollectionEvent::Change(_) => Topic::Change,
            CollectionEvent::Settled(_) => Topic::Settled,
        }
    }
}

/// Where a collection reads from and how its records are keyed
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    /// Name used in log lines, e.g. `registry` or `ring:default`
    pub name: String,
    /// Absolute URL, URL relative to `base_url`, or local data path
    pub location: String,
    pub base_url: Option<Url>,
    pub local_root: Option<PathBuf>,
    /// Record property holding the entry key
    pub id_property: String,
}

/// What a successful load did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Loaded {
    pub count: usize,
    /// Whether content differs from the snapshot passed in, if any
    pub changed: Option<bool>,
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    entries: Option<Vec<Value>>,
}

struct CollectionState<R> {
    entries: Arc<Entries<R>>,
    last_fetched_at: Option<DateTime<Utc>>,
    last_error: Option<FetchError>,
}

pub struct RemoteKeyedCollection<R: Record> {
    name: String,
    id_property: String,
    source_url: Result<Url, FetchError>,
    source: Arc<dyn RemoteSource>,
    logger: FetchLogger,
    state: RwLock<CollectionState<R>>,
    events: EventTopicBus<Topic, CollectionEvent<R>>,
}

impl<R: Record> RemoteKeyedCollection<R> {
    pub fn new(spec: CollectionSpec, source: Arc<dyn RemoteSource>, logger: FetchLogger) -> Self {
        let source_url = resolve_location(
            &spec.location,
            spec.base_url.as_ref(),
            spec.local_root.as_deref(),
        );
        match &source_url {
            Ok(url) => debug!("{} collection reads from {}", spec.name, url),
            Err(e) => warn!("{} collection has no usable source: {}", spec.name, e),
        }

        Self {
            name: spec.name,
            id_property: spec.id_property,
            source_url,
            source,
            logger,
            state: RwLock::new(CollectionState {
                entries: Arc::new(IndexMap::new()),
                last_fetched_at: None,
                last_error: None,
            }),
            events: EventTopicBus::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved source URL, if the location hint could be resolved
    pub fn source_url(&self) -> Option<&Url> {
        self.source_url.as_ref().ok()
    }

    /// Run one fetch cycle and announce it on the `Settled` topic
    pub async fn fetch_data(&self) -> FetchOutcome {
        let outcome = match self.load(None).await {
            Ok(loaded) => FetchOutcome::Populated(loaded.count),
            Err(e) => FetchOutcome::Failed(e),
        };
        self.publish(CollectionEvent::Settled(outcome.clone()));
        outcome
    }

    /// Fetch, parse and populate without publishing `Settled`
    ///
    /// With `before`, the new content is compared against that canonical
    /// snapshot and the result reported. Errors are already recorded and
    /// published on `Error` by the time this returns.
    pub(crate) async fn load(&self, before: Option<&[u8]>) -> Result<Loaded, FetchError> {
        let url = match &self.source_url {
            Ok(url) => url.clone(),
            Err(e) => {
                let context = self.logger.start_fetch(&self.name, None);
                self.logger.fail_fetch(&context, e);
                self.report_error(e.clone());
                return Err(e.clone());
            }
        };

        let context = self.logger.start_fetch(&self.name, Some(url.as_str()));
        let parsed = match self.source.fetch(&url).await {
            Ok(body) => {
                self.logger.log_response(&context, body.len());
                self.parse(&url, &body)
            }
            Err(e) => Err(e),
        };

        match parsed {
            Ok(entries) => {
                let count = entries.len();
                self.populate(entries);
                let changed = before.map(|before| self.canonical_snapshot() != before);
                self.logger.complete_fetch(&context, count, changed);
                Ok(Loaded { count, changed })
            }
            Err(e) => {
                self.logger.fail_fetch(&context, &e);
                self.report_error(e.clone());
                Err(e)
            }
        }
    }

    fn parse(&self, url: &Url, body: &[u8]) -> Result<Entries<R>, FetchError> {
        let parse_error = |message: String| FetchError::Parse {
            url: url.to_string(),
            message,
        };

        let document: Document =
            serde_json::from_slice(body).map_err(|e| parse_error(e.to_string()))?;

        let mut entries = IndexMap::new();
        for (index, value) in document.entries.unwrap_or_default().into_iter().enumerate() {
            let key = value
                .get(&self.id_property)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    parse_error(format!(
                        "entry {} has no string '{}' property",
                        index, self.id_property
                    ))
                })?;
            let record: R = serde_json::from_value(value)
                .map_err(|e| parse_error(format!("entry {} ({}): {}", index, key, e)))?;
            if entries.insert(key.clone(), record).is_some() {
                debug!("{}: duplicate key '{}' replaces earlier entry", self.name, key);
            }
        }
        Ok(entries)
    }

    fn populate(&self, entries: Entries<R>) {
        let mut state = self.state.write();
        state.entries = Arc::new(entries);
        state.last_error = None;
        state.last_fetched_at = Some(Utc::now());
    }

    fn report_error(&self, error: FetchError) {
        {
            let mut state = self.state.write();
            state.last_error = Some(error.clone());
            state.last_fetched_at = Some(Utc::now());
        }
        self.publish(CollectionEvent::Error(error));
    }

    pub(crate) fn publish(&self, event: CollectionEvent<R>) {
        self.events.publish(event.topic(), &event);
    }

    /// Canonical bytes of the current content, stable for equal content
    pub(crate) fn canonical_snapshot(&self) -> Vec<u8> {
        let entries = self.entries();
        serde_json::to_vec(&*entries).unwrap_or_default()
    }

    /// Detach every listener and drop all entries
    pub fn reset(&self) {
        self.events.clear();
        let mut state = self.state.write();
        state.entries = Arc::new(IndexMap::new());
    }

    pub fn subscribe<F>(&self, topic: Topic, listener: F) -> ListenerId
    where
        F: Fn(&CollectionEvent<R>) + Send + Sync + 'static,
    {
        self.events.subscribe(topic, listener)
    }

    pub fn unsubscribe(&self, topic: Topic, id: ListenerId) -> bool {
        self.events.unsubscribe(topic, id)
    }

    pub(crate) fn clear_listeners(&self) {
        self.events.clear();
    }

    pub fn listener_count(&self, topic: Topic) -> usize {
        self.events.listener_count(topic)
    }

    /// Snapshot of the entries; never observes a partially populated set
    pub fn entries(&self) -> Arc<Entries<R>> {
        Arc::clone(&self.state.read().entries)
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.read().entries.keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<R> {
        self.state.read().entries.get(key).cloned()
    }

    pub fn position_of(&self, key: &str) -> Option<usize> {
        self.state.read().entries.get_index_of(key)
    }

    pub fn key_at(&self, index: usize) -> Option<String> {
        self.state
            .read()
            .entries
            .get_index(index)
            .map(|(key, _)| key.clone())
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_error(&self) -> Option<FetchError> {
        self.state.read().last_error.clone()
    }

    pub fn last_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_fetched_at
    }
}
