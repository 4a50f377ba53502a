//! Study Buddy command-line client
//!
//! Loads every page from the backend (demo data stands in when it is
//! unreachable) and prints a summary: groups, session status tabs and a
//! partner search for the first argument.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use study_buddy::filter::PartnerQuery;
use study_buddy::services::DataSource;
use study_buddy::{AppConfig, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("study_buddy={},reqwest=warn", config.log_level).into()
    });

    if config.json_logs() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| anyhow!("Configuration error: {}", e))?;
    init_tracing(&config);

    info!("Study Buddy starting");
    info!("Environment: {}", config.environment);
    info!("Backend: {}", config.api.base_url);

    let state = Arc::new(AppState::new(config).context("Failed to initialise application state")?);
    let listener = state.spawn_invalidation_listener();

    let summary = state.load_all().await;
    if summary.groups == DataSource::Fallback {
        warn!("Backend unreachable; showing demo data");
    }

    let groups = state.groups.groups().await;
    let joined = state.groups.my_groups().await;
    println!("Groups: {} ({} joined)", groups.len(), joined.len());
    for group in &groups {
        println!(
            "  {} [{}] {}/{} members",
            group.name,
            group.kind.as_str(),
            group.member_count,
            group.max_members
        );
    }

    let tabs: Vec<String> = state
        .sessions
        .tabs()
        .await
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("Sessions: {}", tabs.join(" | "));

    let text = std::env::args().nth(1).unwrap_or_default();
    let search = state.partners.search(&PartnerQuery::text(text.as_str())).await;
    println!("Partners matching {:?}:", text);
    match search.empty_state() {
        Some(message) => println!("  {}", message),
        None => {
            for partner in &search.results {
                println!(
                    "  {} ({:.0}% match, {} shared courses)",
                    partner.name,
                    partner.compatibility_score,
                    partner.shared_course_count()
                );
            }
        }
    }

    let buddies = state.partners.buddies().await;
    println!("Buddies: {}", buddies.len());

    if let Some(banner) = state.groups.page().banner().await {
        warn!("{}", banner.message);
    }

    state.shutdown();
    listener.abort();
    info!("Study Buddy shutdown complete");
    Ok(())
}
