use super::AppContext;
use anyhow::Result;
use colored::Colorize;
use futures::future::join_all;
use log::info;
use std::sync::Arc;
use webring_nav::remote::FetchOutcome;

pub async fn rings_command(context: &AppContext) -> Result<()> {
    info!("Listing rings from {}", context.config.registry_url);

    if let FetchOutcome::Failed(e) = context.registry.fetch_data().await {
        anyhow::bail!("Ring catalog unavailable: {}", e);
    }

    let definitions = context.registry.definitions();
    if definitions.is_empty() {
        println!("{}", "The catalog lists no rings.".yellow());
        return Ok(());
    }

    // Member counts are fetched for all rings at once
    let outcomes = join_all(definitions.values().map(|definition| async move {
        context
            .registry
            .collection_for(definition, Arc::clone(&context.source), &context.fetch)
            .fetch_data()
            .await
    }))
    .await;

    for ((id, definition), outcome) in definitions.iter().zip(outcomes) {
        let marker = if *id == context.config.selected_ring {
            "*".green().bold()
        } else {
            " ".normal()
        };
        let members = match outcome {
            FetchOutcome::Populated(count) => format!("{} members", count).normal(),
            FetchOutcome::Failed(e) => {
                info!("Ring '{}' unavailable: {}", id, e);
                "unavailable".red()
            }
        };
        let refresh = definition
            .data_refresh_seconds
            .map(|s| format!("every {}s", s))
            .unwrap_or_else(|| "default refresh".to_string());
        println!(
            "{} {:<16} {}  {}  {}",
            marker,
            id.bold(),
            definition.display_title(),
            members,
            format!("({}, {})", definition.collection_url, refresh).dimmed()
        );
    }
    Ok(())
}
