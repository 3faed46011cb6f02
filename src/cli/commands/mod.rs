pub mod browse;
pub mod entries;
pub mod rings;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use webring_nav::config::Config;
use webring_nav::remote::{FetchConfig, HttpSource, RemoteSource};
use webring_nav::ring::RingRegistry;

pub use browse::{BrowseCommand, browse_command};
pub use entries::{EntriesCommand, entries_command};
pub use rings::rings_command;

/// Pieces every command needs: fetch settings, transport and catalog
pub struct AppContext {
    pub config: Config,
    /// File the config was read from; session choices are saved back here
    pub config_path: PathBuf,
    pub fetch: FetchConfig,
    pub source: Arc<dyn RemoteSource>,
    pub registry: RingRegistry,
}

impl AppContext {
    pub fn new(config: Config, config_path: PathBuf) -> Result<Self> {
        let fetch = config.fetch_config();
        let source: Arc<dyn RemoteSource> = Arc::new(HttpSource::new(&fetch.http)?);
        let registry = RingRegistry::new(
            &config.registry_url,
            Some(config.local_data_root()?),
            Some(config.data_refresh_seconds),
            Arc::clone(&source),
            &fetch,
        );

        Ok(Self {
            config,
            config_path,
            fetch,
            source,
            registry,
        })
    }
}
