// Correspondence - office letter routing and approval tracking
// Entry point: opens the store, bootstraps it and reports its state

use anyhow::Context;
use correspondence::aggregation::StatusSummary;
use correspondence::config::AppConfig;
use correspondence::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "correspondence=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting correspondence");

    let config = AppConfig::from_env();
    let state = AppState::open(&config)
        .await
        .with_context(|| format!("failed to open store in {}", config.data_dir.display()))?;

    let settings = state.settings.load().await.context("failed to load settings")?;
    let users = state.users.list_all().await.context("failed to list users")?;
    let letters = state.letter_repo.list_all().await.context("failed to list letters")?;
    let summary = StatusSummary::from_letters(&letters);

    tracing::info!(
        "{}: {} users, {} letters ({} pending, {} approved, {} rejected)",
        settings.site_name,
        users.len(),
        summary.total,
        summary.pending,
        summary.approved,
        summary.rejected
    );

    Ok(())
}
