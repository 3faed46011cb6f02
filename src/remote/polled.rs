//! Recurring refresh and change detection on top of a remote collection
//!
//! `Change` is only published when the canonical serialization of the
//! entries differs from what it was before the cycle.

use super::collection::{CollectionEvent, FetchOutcome, Record, RemoteKeyedCollection};
use super::config::PollingConfig;
use super::events::{ListenerId, Topic};
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

pub struct PolledRemoteCollection<R: Record> {
    inner: Arc<PolledInner<R>>,
}

struct PolledInner<R: Record> {
    collection: RemoteKeyedCollection<R>,
    polling: PollingConfig,
    refresh_seconds: Mutex<Option<u64>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    // Serializes fetch cycles of this collection
    fetch_gate: tokio::sync::Mutex<()>,
}

impl<R: Record> Clone for PolledRemoteCollection<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Record> Drop for PolledInner<R> {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}

impl<R: Record> PolledRemoteCollection<R> {
    pub fn new(
        collection: RemoteKeyedCollection<R>,
        refresh_seconds: Option<u64>,
        polling: PollingConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PolledInner {
                collection,
                polling,
                refresh_seconds: Mutex::new(refresh_seconds),
                timer: Mutex::new(None),
                fetch_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// The wrapped collection, for reads
    pub fn collection(&self) -> &RemoteKeyedCollection<R> {
        &self.inner.collection
    }

    /// Cadence in effect, after fallback and floor are applied
    pub fn refresh_interval(&self) -> Duration {
        self.inner
            .polling
            .effective_interval(*self.inner.refresh_seconds.lock())
    }

    pub fn refresh_seconds(&self) -> Option<u64> {
        *self.inner.refresh_seconds.lock()
    }

    pub fn is_watching(&self) -> bool {
        self.inner.timer.lock().is_some()
    }

    /// Run one fetch cycle, publishing `Change` when content differs
    pub async fn fetch_data(&self) -> FetchOutcome {
        let _gate = self.inner.fetch_gate.lock().await;
        let collection = &self.inner.collection;

        let before = collection.canonical_snapshot();
        let outcome = match collection.load(Some(&before)).await {
            Ok(loaded) => {
                if loaded.changed == Some(true) {
                    info!("{} changed, {} entries", collection.name(), loaded.count);
                    collection.publish(CollectionEvent::Change(collection.entries()));
                } else {
                    debug!("No change to remote data: {}", collection.name());
                }
                FetchOutcome::Populated(loaded.count)
            }
            Err(e) => FetchOutcome::Failed(e),
        };

        collection.publish(CollectionEvent::Settled(outcome.clone()));
        outcome
    }

    /// Restart the refresh timer and return the outcome of the immediate
    /// first fetch
    pub async fn start_watching(&self) -> FetchOutcome {
        self.stop_timer();

        let period = self.refresh_interval();
        info!(
            "Scheduling {} refresh every {}s",
            self.inner.collection.name(),
            period.as_secs()
        );

        let weak: Weak<PolledInner<R>> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                PolledRemoteCollection { inner }.fetch_data().await;
            }
        });
        *self.inner.timer.lock() = Some(handle);

        self.fetch_data().await
    }

    /// Change the cadence; an active timer is restarted with an immediate
    /// fetch, whose outcome is returned
    pub async fn set_refresh_interval(&self, seconds: Option<u64>) -> Option<FetchOutcome> {
        {
            let mut current = self.inner.refresh_seconds.lock();
            if *current == seconds {
                return None;
            }
            *current = seconds;
        }

        if self.is_watching() {
            Some(self.start_watching().await)
        } else {
            None
        }
    }

    /// Register a callback for content changes
    pub fn on_change<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&CollectionEvent<R>) + Send + Sync + 'static,
    {
        self.inner.collection.subscribe(Topic::Change, callback)
    }

    pub fn subscribe<F>(&self, topic: Topic, listener: F) -> ListenerId
    where
        F: Fn(&CollectionEvent<R>) + Send + Sync + 'static,
    {
        self.inner.collection.subscribe(topic, listener)
    }

    pub fn unsubscribe(&self, topic: Topic, id: ListenerId) -> bool {
        self.inner.collection.unsubscribe(topic, id)
    }

    /// Stop polling and detach all listeners; safe to call repeatedly
    pub fn dispose(&self) {
        if self.stop_timer() {
            debug!("Disposed {}", self.inner.collection.name());
        }
        self.inner.collection.clear_listeners();
    }

    fn stop_timer(&self) -> bool {
        match self.inner.timer.lock().take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::collection::CollectionSpec;
    use crate::remote::config::MonitoringConfig;
    use crate::remote::error::FetchError;
    use crate::remote::logging::FetchLogger;
    use crate::remote::source::RemoteSource;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Item {
        url: String,
    }

    /// Serves whatever body is currently set and counts requests
    struct Switchable {
        body: Mutex<Result<String, u16>>,
        hits: AtomicUsize,
    }

    #[async_trait]
    impl RemoteSource for Switchable {
        async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            match &*self.body.lock() {
                Ok(body) => Ok(body.clone().into_bytes()),
                Err(status) => Err(FetchError::Status {
                    url: url.to_string(),
                    status: *status,
                    reason: "scripted".to_string(),
                }),
            }
        }
    }

    fn setup(body: &str) -> (Arc<Switchable>, PolledRemoteCollection<Item>, Arc<AtomicUsize>) {
        let source = Arc::new(Switchable {
            body: Mutex::new(Ok(body.to_string())),
            hits: AtomicUsize::new(0),
        });
        let collection = RemoteKeyedCollection::new(
            CollectionSpec {
                name: "ring:test".to_string(),
                location: "https://ring.example/a.json".to_string(),
                base_url: None,
                local_root: None,
                id_property: "url".to_string(),
            },
            source.clone(),
            FetchLogger::new(MonitoringConfig::default()),
        );
        let polled = PolledRemoteCollection::new(collection, Some(60), PollingConfig::default());
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&changes);
        polled.on_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (source, polled, changes)
    }

    const AB: &str = r#"{"entries":[{"url":"https://a/"},{"url":"https://b/"}]}"#;
    const BA: &str = r#"{"entries":[{"url":"https://b/"},{"url":"https://a/"}]}"#;

    #[tokio::test]
    async fn test_identical_content_publishes_no_change() {
        let (_source, polled, changes) = setup(AB);

        polled.fetch_data().await;
        polled.fetch_data().await;
        polled.fetch_data().await;

        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reorder_publishes_exactly_one_change() {
        let (source, polled, changes) = setup(AB);
        polled.fetch_data().await;

        *source.body.lock() = Ok(BA.to_string());
        polled.fetch_data().await;

        assert_eq!(changes.load(Ordering::SeqCst), 2);
        assert_eq!(polled.collection().keys(), vec!["https://b/", "https://a/"]);
    }

    #[tokio::test]
    async fn test_failed_fetch_never_changes() {
        let (source, polled, changes) = setup(AB);
        polled.fetch_data().await;

        *source.body.lock() = Err(503);
        let outcome = polled.fetch_data().await;

        assert!(!outcome.is_success());
        assert_eq!(changes.load(Ordering::SeqCst), 1);
        assert_eq!(polled.collection().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_first_load_is_not_a_change() {
        let (_source, polled, changes) = setup(r#"{"entries":[]}"#);

        assert_eq!(polled.fetch_data().await, FetchOutcome::Populated(0));
        assert_eq!(changes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_watching_polls_on_interval() {
        let (source, polled, _changes) = setup(AB);

        assert!(polled.start_watching().await.is_success());
        assert_eq!(source.hits.load(Ordering::SeqCst), 1);
        assert!(polled.is_watching());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(source.hits.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_timer_and_is_idempotent() {
        let (source, polled, _changes) = setup(AB);
        polled.start_watching().await;

        polled.dispose();
        polled.dispose();

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(source.hits.load(Ordering::SeqCst), 1);
        assert!(!polled.is_watching());
        assert_eq!(polled.collection().listener_count(Topic::Change), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_restarts_watching() {
        let (source, polled, _changes) = setup(AB);
        polled.start_watching().await;

        let outcome = polled.set_refresh_interval(Some(10)).await;
        assert!(outcome.is_some());
        assert_eq!(source.hits.load(Ordering::SeqCst), 2);
        assert_eq!(polled.refresh_interval(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(source.hits.load(Ordering::SeqCst), 3);

        assert!(polled.set_refresh_interval(Some(10)).await.is_none());
    }

    #[tokio::test]
    async fn test_interval_change_while_idle_does_not_fetch() {
        let (source, polled, _changes) = setup(AB);

        assert!(polled.set_refresh_interval(Some(30)).await.is_none());
        assert_eq!(source.hits.load(Ordering::SeqCst), 0);
    }
}
