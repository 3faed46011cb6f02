//! Messages exchanged with the presentation layer
//!
//! Wire shape is `{ "action": <name>, "data": <payload> }`.

use super::model::{RingDefinition, RingEntry};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User intent to move within the active ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RingAction {
    Back,
    Next,
    Random,
}

impl FromStr for RingAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "back" | "prev" | "previous" => Ok(RingAction::Back),
            "next" => Ok(RingAction::Next),
            "random" => Ok(RingAction::Random),
            other => anyhow::bail!("Unknown ring action '{}'", other),
        }
    }
}

impl fmt::Display for RingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RingAction::Back => "back",
            RingAction::Next => "next",
            RingAction::Random => "random",
        };
        f.write_str(name)
    }
}

/// UI → core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data")]
pub enum PanelRequest {
    #[serde(rename = "panelReady")]
    PanelReady,
    #[serde(rename = "ringAction")]
    RingAction(RingAction),
    #[serde(rename = "ringRequest")]
    RingRequest(String),
}

/// Core → UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data")]
pub enum PanelMessage {
    #[serde(rename = "dataUpdate")]
    DataUpdate(DataUpdate),
}

/// Everything the panel needs to render without further queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataUpdate {
    #[serde(rename = "entriesList")]
    pub entries_list: Vec<RingEntry>,
    #[serde(rename = "ringsById")]
    pub rings_by_id: IndexMap<String, RingDefinition>,
    /// Position of the current page, -1 when not a member
    #[serde(rename = "ringURLIndex")]
    pub ring_url_index: i64,
    #[serde(rename = "ringURLCount")]
    pub ring_url_count: usize,
    #[serde(rename = "currentRingId")]
    pub current_ring_id: Option<String>,
}
