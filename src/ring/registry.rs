//! Catalog of available rings, kept fresh by polling

use super::model::{RingDefinition, RingEntry};
use crate::remote::{
    CollectionEvent, CollectionSpec, Entries, FetchConfig, FetchLogger, FetchOutcome, ListenerId,
    PolledRemoteCollection, RemoteKeyedCollection, RemoteSource, Topic,
};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Record property keying catalog entries
pub const REGISTRY_ID_PROPERTY: &str = "id";

/// Record property keying ring entries
pub const RING_ID_PROPERTY: &str = "url";

#[derive(Clone)]
pub struct RingRegistry {
    polled: PolledRemoteCollection<RingDefinition>,
    local_root: Option<PathBuf>,
}

impl RingRegistry {
    pub fn new(
        location: &str,
        local_root: Option<PathBuf>,
        refresh_seconds: Option<u64>,
        source: Arc<dyn RemoteSource>,
        config: &FetchConfig,
    ) -> Self {
        let collection = RemoteKeyedCollection::new(
            CollectionSpec {
                name: "registry".to_string(),
                location: location.to_string(),
                base_url: None,
                local_root: local_root.clone(),
                id_property: REGISTRY_ID_PROPERTY.to_string(),
            },
            source,
            FetchLogger::new(config.monitoring.clone()),
        );

        Self {
            polled: PolledRemoteCollection::new(collection, refresh_seconds, config.polling.clone()),
            local_root,
        }
    }

    pub fn get(&self, ring_id: &str) -> Option<RingDefinition> {
        self.polled.collection().get(ring_id)
    }

    /// Ordered snapshot of every known definition
    pub fn definitions(&self) -> Arc<Entries<RingDefinition>> {
        self.polled.collection().entries()
    }

    pub fn ring_ids(&self) -> Vec<String> {
        self.polled.collection().keys()
    }

    /// Base against which relative ring `collectionURL`s resolve
    pub fn base_url(&self) -> Option<&Url> {
        self.polled.collection().source_url()
    }

    /// Build the data collection for one ring; relative locations resolve
    /// against the catalog's own URL, then the local data directory
    pub fn collection_for(
        &self,
        definition: &RingDefinition,
        source: Arc<dyn RemoteSource>,
        config: &FetchConfig,
    ) -> PolledRemoteCollection<RingEntry> {
        let collection = RemoteKeyedCollection::new(
            CollectionSpec {
                name: format!("ring:{}", definition.id),
                location: definition.collection_url.clone(),
                base_url: self.base_url().cloned(),
                local_root: self.local_root.clone(),
                id_property: RING_ID_PROPERTY.to_string(),
            },
            source,
            FetchLogger::new(config.monitoring.clone()),
        );
        PolledRemoteCollection::new(
            collection,
            definition.data_refresh_seconds,
            config.polling.clone(),
        )
    }

    pub fn is_available(&self) -> bool {
        self.polled.collection().last_error().is_none() && !self.polled.collection().is_empty()
    }

    pub async fn fetch_data(&self) -> FetchOutcome {
        self.polled.fetch_data().await
    }

    pub async fn start_watching(&self) -> FetchOutcome {
        self.polled.start_watching().await
    }

    pub fn subscribe<F>(&self, topic: Topic, listener: F) -> ListenerId
    where
        F: Fn(&CollectionEvent<RingDefinition>) + Send + Sync + 'static,
    {
        self.polled.subscribe(topic, listener)
    }

    pub fn unsubscribe(&self, topic: Topic, id: ListenerId) -> bool {
        self.polled.unsubscribe(topic, id)
    }

    pub fn polled(&self) -> &PolledRemoteCollection<RingDefinition> {
        &self.polled
    }

    pub fn dispose(&self) {
        self.polled.dispose();
    }
}
