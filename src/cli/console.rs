//! Terminal stand-in for the browser: one simulated tab, an icon printed
//! as a status line, and data updates rendered as a short summary.

use anyhow::Result;
use async_trait::async_trait;
use colored::Colorize;
use log::warn;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use webring_nav::ring::{IconSink, IconState, PanelMessage, PanelSink, Tab, TabControl, TabId};

pub const CONSOLE_TAB: TabId = TabId(1);

pub struct ConsoleHost {
    location: Mutex<Option<String>>,
    tab_updates: mpsc::UnboundedSender<Tab>,
}

impl ConsoleHost {
    /// Returns the host and the stream of tab updates it reports
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Tab>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                location: Mutex::new(None),
                tab_updates: tx,
            },
            rx,
        )
    }

    /// Simulate the user typing a location into the tab
    pub fn open(&self, url: &str) {
        *self.location.lock() = Some(url.to_string());
        if let Err(e) = self.tab_updates.send(Tab::new(CONSOLE_TAB.0, url)) {
            warn!("Tab update for {} was dropped: {}", url, e);
        }
    }

    pub fn location(&self) -> Option<String> {
        self.location.lock().clone()
    }
}

#[async_trait]
impl TabControl for ConsoleHost {
    async fn active_tab(&self) -> Result<Option<Tab>> {
        Ok(Some(Tab {
            id: Some(CONSOLE_TAB),
            url: self.location(),
        }))
    }

    async fn navigate(&self, tab: TabId, url: &str, _bring_to_front: bool) -> Result<()> {
        if tab != CONSOLE_TAB {
            anyhow::bail!("No such tab: {}", tab);
        }
        println!("{} {}", "→".blue().bold(), url.underline());
        self.open(url);
        Ok(())
    }
}

impl IconSink for ConsoleHost {
    fn set_icon(&self, state: IconState) {
        let label = match state {
            IconState::InRing => "◉ in ring".green().bold(),
            IconState::Error => "✖ ring data error".red().bold(),
            IconState::Default => "○ not in ring".normal(),
        };
        println!("[icon] {}", label);
    }
}

impl PanelSink for ConsoleHost {
    fn send(&self, message: PanelMessage) {
        let PanelMessage::DataUpdate(update) = message;
        let title = update
            .current_ring_id
            .as_ref()
            .and_then(|id| update.rings_by_id.get(id))
            .map(|def| def.display_title().to_string())
            .unwrap_or_else(|| "no ring".to_string());
        let position = if update.ring_url_index >= 0 {
            format!("{} of {}", update.ring_url_index + 1, update.ring_url_count)
        } else {
            format!("- of {}", update.ring_url_count)
        };
        println!(
            "[panel] {} {} {}",
            title.bold(),
            position,
            format!("({} rings in catalog)", update.rings_by_id.len()).dimmed()
        );
    }
}
