//! Source location resolution and the transport used to read documents
//!
//! A source hint is tried as an absolute URL, then relative to a base URL,
//! then as a path under the local data directory. `file:` URLs are read
//! from disk; everything else goes over HTTP.

use super::config::HttpConfig;
use super::error::FetchError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::path::Path;
use url::Url;

/// Resolve a source hint into an absolute URL, first success wins
pub fn resolve_location(
    hint: &str,
    base: Option<&Url>,
    local_root: Option<&Path>,
) -> Result<Url, FetchError> {
    let hint = hint.trim();
    if hint.is_empty() {
        return Err(FetchError::Resolution {
            hint: hint.to_string(),
            reason: "empty location".to_string(),
        });
    }

    let absolute_err = match Url::parse(hint) {
        Ok(url) => return Ok(url),
        Err(e) => e,
    };

    if let Some(base) = base {
        if let Ok(url) = base.join(hint) {
            debug!("Resolved '{}' against base {}", hint, base);
            return Ok(url);
        }
    }

    if let Some(root) = local_root {
        let candidate = root.join(hint.trim_start_matches('/'));
        let candidate = std::path::absolute(&candidate).unwrap_or(candidate);
        if let Ok(url) = Url::from_file_path(&candidate) {
            debug!("Resolved '{}' to local data file {}", hint, url);
            return Ok(url);
        }
    }

    Err(FetchError::Resolution {
        hint: hint.to_string(),
        reason: absolute_err.to_string(),
    })
}

/// Reads the raw body of a remote document
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Return the body of a 2xx response, or the failure that prevented it
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// `RemoteSource` backed by a shared reqwest client and the local filesystem
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    async fn fetch_file(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let path = url.to_file_path().map_err(|_| FetchError::Transport {
            url: url.to_string(),
            message: "not a local file path".to_string(),
        })?;

        tokio::fs::read(&path)
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    async fn fetch_http(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        debug!("GET {} -> {}", url, status);
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        match url.scheme() {
            "file" => self.fetch_file(url).await,
            "http" | "https" => self.fetch_http(url).await,
            other => Err(FetchError::Transport {
                url: url.to_string(),
                message: format!("unsupported scheme '{}'", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_absolute_url_wins() {
        let base = Url::parse("https://ring.example/catalog/rings.json").unwrap();
        let url = resolve_location("https://other.example/a.json", Some(&base), None).unwrap();
        assert_eq!(url.as_str(), "https://other.example/a.json");
    }

    #[test]
    fn test_relative_to_base() {
        let base = Url::parse("https://ring.example/catalog/rings.json").unwrap();
        let url = resolve_location("a.json", Some(&base), None).unwrap();
        assert_eq!(url.as_str(), "https://ring.example/catalog/a.json");
    }

    #[test]
    fn test_local_data_dir_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let url = resolve_location("data/rings.json", None, Some(dir.path())).unwrap();

        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("/data/rings.json"));
    }

    #[test]
    fn test_unresolvable_hint() {
        let err = resolve_location("rings.json", None, None).unwrap_err();
        assert_eq!(err.kind(), "resolution");

        let err = resolve_location("   ", None, None).unwrap_err();
        assert_eq!(err.kind(), "resolution");
    }

    #[tokio::test]
    async fn test_file_source_reads_local_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(br#"{"entries":[]}"#).unwrap();

        let source = HttpSource::new(&HttpConfig::default()).unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let body = source.fetch(&url).await.unwrap();
        assert_eq!(body, br#"{"entries":[]}"#);
    }

    #[tokio::test]
    async fn test_missing_local_file_is_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("missing.json")).unwrap();

        let source = HttpSource::new(&HttpConfig::default()).unwrap();
        let err = source.fetch(&url).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let source = HttpSource::new(&HttpConfig::default()).unwrap();
        let url = Url::parse("ftp://ring.example/a.json").unwrap();

        let err = source.fetch(&url).await.unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }
}
