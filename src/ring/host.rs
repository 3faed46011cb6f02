//! Interfaces to the host environment the navigator drives
//!
//! The navigator never talks to a browser directly; it is handed
//! implementations of these traits at construction.

use super::messages::PanelMessage;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Host identifier of a tab; negative values mean "no tab"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub i64);

impl TabId {
    pub const NONE: TabId = TabId(-1);

    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the host reports about a tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: Option<TabId>,
    pub url: Option<String>,
}

impl Tab {
    pub fn new(id: i64, url: impl Into<String>) -> Self {
        Self {
            id: Some(TabId(id)),
            url: Some(url.into()),
        }
    }
}

/// Tab tracking and navigation
#[async_trait]
pub trait TabControl: Send + Sync {
    /// The active tab of the current window, if any
    async fn active_tab(&self) -> Result<Option<Tab>>;

    /// Load `url` into `tab`, optionally bringing it to front
    async fn navigate(&self, tab: TabId, url: &str, bring_to_front: bool) -> Result<()>;
}

/// Toolbar indicator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IconState {
    Default,
    InRing,
    Error,
}

impl fmt::Display for IconState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IconState::Default => "default",
            IconState::InRing => "in-ring",
            IconState::Error => "error",
        };
        f.write_str(name)
    }
}

pub trait IconSink: Send + Sync {
    fn set_icon(&self, state: IconState);
}

/// Outbound half of the presentation channel
pub trait PanelSink: Send + Sync {
    fn send(&self, message: PanelMessage);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_id_validity() {
        assert!(TabId(0).is_valid());
        assert!(TabId(42).is_valid());
        assert!(!TabId::NONE.is_valid());
    }

    #[test]
    fn test_icon_state_names() {
        assert_eq!(IconState::InRing.to_string(), "in-ring");
        assert_eq!(
            serde_json::to_string(&IconState::InRing).unwrap(),
            "\"in-ring\""
        );
    }
}
