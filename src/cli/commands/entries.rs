use super::AppContext;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::sync::Arc;
use webring_nav::remote::FetchOutcome;

#[derive(Args)]
pub struct EntriesCommand {
    /// Ring id; defaults to the configured ring
    pub ring: Option<String>,
}

pub async fn entries_command(context: &AppContext, command: EntriesCommand) -> Result<()> {
    let ring_id = command
        .ring
        .unwrap_or_else(|| context.config.selected_ring.clone());

    if let FetchOutcome::Failed(e) = context.registry.fetch_data().await {
        anyhow::bail!("Ring catalog unavailable: {}", e);
    }
    let Some(definition) = context.registry.get(&ring_id) else {
        anyhow::bail!("Ring '{}' not found in the catalog", ring_id);
    };

    let ring = context
        .registry
        .collection_for(&definition, Arc::clone(&context.source), &context.fetch);
    if let FetchOutcome::Failed(e) = ring.fetch_data().await {
        anyhow::bail!("Ring '{}' data unavailable: {}", ring_id, e);
    }

    println!(
        "{} {}",
        definition.display_title().bold(),
        format!("({} members)", ring.collection().len()).dimmed()
    );
    for (index, entry) in ring.collection().entries().values().enumerate() {
        match &entry.who {
            Some(who) => println!("{:>4}  {}  {}", index, entry.url, who.cyan()),
            None => println!("{:>4}  {}", index, entry.url),
        }
    }
    Ok(())
}
