use super::AppContext;
use crate::cli::console::ConsoleHost;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use log::{info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use webring_nav::config::Config;
use webring_nav::remote::FetchOutcome;
use webring_nav::ring::{NavigatorHost, PanelRequest, RingAction, RingNavigator};

#[derive(Args)]
pub struct BrowseCommand {
    /// Ring to start on; defaults to the configured ring
    #[arg(long)]
    pub ring: Option<String>,

    /// Page the simulated tab starts on
    #[arg(long)]
    pub open: Option<String>,
}

const HELP: &str = "commands: open <url> | back | next | random | ring <id> | rings | status | help | quit
raw panel messages are accepted as JSON, e.g. {\"action\":\"ringAction\",\"data\":\"next\"}";

pub async fn browse_command(context: AppContext, command: BrowseCommand) -> Result<()> {
    let (host, mut tab_updates) = ConsoleHost::new();
    let host = Arc::new(host);
    if let Some(url) = &command.open {
        host.open(url);
    }

    let navigator = RingNavigator::new(
        context.registry.clone(),
        NavigatorHost {
            tabs: host.clone(),
            icon: host.clone(),
            panel: host.clone(),
        },
        Arc::clone(&context.source),
        context.fetch.clone(),
    );
    navigator.on_message(PanelRequest::PanelReady).await?;

    if let FetchOutcome::Failed(e) = context.registry.start_watching().await {
        warn!("Ring catalog unavailable at startup: {}", e);
        println!(
            "{} {}",
            "Ring catalog unavailable, retrying in the background:".yellow(),
            e
        );
    }

    let ring_id = command
        .ring
        .unwrap_or_else(|| context.config.selected_ring.clone());
    navigator.start(&ring_id).await;

    println!("{}", HELP.dimmed());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&navigator, &host, line.trim()).await {
                    break;
                }
            }
            Some(tab) = tab_updates.recv() => navigator.on_tab_updated(&tab),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Shutting down navigator");
    let active_ring = navigator.active_ring_id();
    navigator.shutdown();
    context.registry.dispose();

    if let Some(ring_id) = active_ring.filter(|id| *id != context.config.selected_ring) {
        Config::set_selected_ring(&context.config_path, &ring_id)?;
        println!("{} {}", "Remembering ring".dimmed(), ring_id.bold());
    }
    Ok(())
}

/// Returns false when the session should end
async fn handle_line(navigator: &RingNavigator, host: &ConsoleHost, line: &str) -> bool {
    if line.is_empty() {
        return true;
    }

    if line.starts_with('{') {
        match serde_json::from_str::<PanelRequest>(line) {
            Ok(request) => report(navigator.on_message(request).await),
            Err(e) => println!("{} {}", "Bad panel message:".red(), e),
        }
        return true;
    }

    let (verb, argument) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb {
        "quit" | "exit" | "q" => return false,
        "help" | "?" => println!("{}", HELP),
        "open" if !argument.is_empty() => host.open(argument),
        "ring" if !argument.is_empty() => {
            if navigator.select_ring(argument).await.is_none() {
                println!("{} {}", "Unknown ring:".red(), argument);
            }
        }
        "rings" => {
            for (id, definition) in navigator.registry().definitions().iter() {
                println!("  {:<16} {}", id.bold(), definition.display_title());
            }
        }
        "status" => print_status(navigator),
        other => match other.parse::<RingAction>() {
            Ok(action) => match navigator.handle_action(action).await {
                Ok(Some(_)) => {}
                Ok(None) => println!("{}", "Nothing to do: not on a ring page".dimmed()),
                Err(e) => println!("{} {}", "✖".red(), e),
            },
            Err(_) => println!("{} {}", "Unknown command:".red(), line),
        },
    }
    true
}

fn report<T, E: std::fmt::Display>(result: std::result::Result<T, E>) {
    if let Err(e) = result {
        println!("{} {}", "✖".red(), e);
    }
}

fn print_status(navigator: &RingNavigator) {
    let update = navigator.data_update();
    println!(
        "ring: {}  phase: {:?}  icon: {}",
        update.current_ring_id.as_deref().unwrap_or("-").bold(),
        navigator.phase(),
        navigator.icon_state()
    );
    println!(
        "page: {}  position: {} of {}",
        navigator.current_page_url().as_deref().unwrap_or("-"),
        update.ring_url_index,
        update.ring_url_count
    );
    if let Some(collection) = navigator.active_collection() {
        if let Some(fetched) = collection.collection().last_fetched_at() {
            println!("last fetch: {}", fetched.to_rfc3339());
        }
        if let Some(error) = collection.collection().last_error() {
            println!("{} {}", "last error:".red(), error);
        }
    }
}
