//! Scripted transport and host doubles shared by the integration tests
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use webring_nav::remote::{FetchConfig, FetchError, RemoteSource};
use webring_nav::ring::{
    DataUpdate, IconSink, IconState, NavigatorHost, PanelMessage, PanelSink, RingNavigator,
    RingRegistry, Tab, TabControl, TabId,
};

pub const REGISTRY_URL: &str = "https://rings.example/rings.json";

enum Response {
    Body(String),
    Status(u16),
}

/// Serves canned bodies or statuses per URL and counts requests
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<HashMap<String, Response>>,
    hits: Mutex<HashMap<String, usize>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, body: impl Into<String>) {
        self.responses
            .lock()
            .insert(url.to_string(), Response::Body(body.into()));
    }

    pub fn fail(&self, url: &str, status: u16) {
        self.responses
            .lock()
            .insert(url.to_string(), Response::Status(status));
    }

    /// Hold every response for `url` back by `delay`
    pub fn delay(&self, url: &str, delay: Duration) {
        self.delays.lock().insert(url.to_string(), delay);
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl RemoteSource for ScriptedSource {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        *self.hits.lock().entry(url.to_string()).or_insert(0) += 1;
        let delay = self.delays.lock().get(url.as_str()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.responses.lock().get(url.as_str()) {
            Some(Response::Body(body)) => Ok(body.clone().into_bytes()),
            Some(Response::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
                reason: "scripted".to_string(),
            }),
            None => Err(FetchError::Transport {
                url: url.to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }
}

/// Records everything the navigator asks of the host
#[derive(Default)]
pub struct RecordingHost {
    pub active: Mutex<Option<Tab>>,
    pub navigations: Mutex<Vec<(TabId, String)>>,
    pub icons: Mutex<Vec<IconState>>,
    pub updates: Mutex<Vec<DataUpdate>>,
    pub reject_navigation: Mutex<bool>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last_icon(&self) -> Option<IconState> {
        self.icons.lock().last().copied()
    }

    pub fn last_update(&self) -> Option<DataUpdate> {
        self.updates.lock().last().cloned()
    }

    pub fn navigated_to(&self) -> Vec<String> {
        self.navigations
            .lock()
            .iter()
            .map(|(_, url)| url.clone())
            .collect()
    }
}

#[async_trait]
impl TabControl for RecordingHost {
    async fn active_tab(&self) -> Result<Option<Tab>> {
        Ok(self.active.lock().clone())
    }

    async fn navigate(&self, tab: TabId, url: &str, _bring_to_front: bool) -> Result<()> {
        if *self.reject_navigation.lock() {
            anyhow::bail!("Tab {} is gone", tab);
        }
        self.navigations.lock().push((tab, url.to_string()));
        Ok(())
    }
}

impl IconSink for RecordingHost {
    fn set_icon(&self, state: IconState) {
        self.icons.lock().push(state);
    }
}

impl PanelSink for RecordingHost {
    fn send(&self, message: PanelMessage) {
        let PanelMessage::DataUpdate(update) = message;
        self.updates.lock().push(update);
    }
}

pub fn ring_doc(urls: &[&str]) -> String {
    let entries: Vec<_> = urls.iter().map(|url| json!({ "url": url })).collect();
    json!({ "entries": entries }).to_string()
}

/// Catalog document; each ring is (id, collectionURL, dataRefreshSeconds)
pub fn catalog_doc(rings: &[(&str, &str, u64)]) -> String {
    let entries: Vec<_> = rings
        .iter()
        .map(|(id, url, refresh)| {
            json!({
                "id": id,
                "title": id.to_uppercase(),
                "collectionURL": url,
                "dataRefreshSeconds": refresh
            })
        })
        .collect();
    json!({ "entries": entries }).to_string()
}

pub fn quiet_config() -> FetchConfig {
    FetchConfig::builder().request_logging(false).build()
}

pub struct Harness {
    pub source: Arc<ScriptedSource>,
    pub host: Arc<RecordingHost>,
    pub registry: RingRegistry,
    pub navigator: RingNavigator,
}

impl Harness {
    pub fn new(source: Arc<ScriptedSource>) -> Self {
        let host = RecordingHost::new();
        let config = quiet_config();
        let registry = RingRegistry::new(REGISTRY_URL, None, Some(3600), source.clone(), &config);
        let navigator = RingNavigator::new(
            registry.clone(),
            NavigatorHost {
                tabs: host.clone(),
                icon: host.clone(),
                panel: host.clone(),
            },
            source.clone(),
            config,
        );
        Self {
            source,
            host,
            registry,
            navigator,
        }
    }
}

/// Poll `condition` until it holds or a second of real time passes
pub async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
