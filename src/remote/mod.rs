//! Remote collection synchronization
//!
//! Fetches `{ "entries": [...] }` documents into ordered keyed collections,
//! keeps them refreshed on a timer and announces errors and real content
//! changes to listeners.

pub mod collection;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod polled;
pub mod source;

pub use collection::{
    CollectionEvent, CollectionSpec, Entries, FetchOutcome, Record, RemoteKeyedCollection,
};
pub use config::{FetchConfig, HttpConfig, LogLevel, MonitoringConfig, PollingConfig};
pub use error::FetchError;
pub use events::{EventTopicBus, ListenerId, Topic};
pub use logging::{FetchContext, FetchLogger};
pub use polled::PolledRemoteCollection;
pub use source::{HttpSource, RemoteSource, resolve_location};
