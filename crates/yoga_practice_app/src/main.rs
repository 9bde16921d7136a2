use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use yoga_practice_app::{PracticeSession, SessionSettings, build_digest};
use yoga_practice_client::challenge::default_catalog;
use yoga_practice_client::config::Config;
use yoga_practice_client::http_client::FirestoreProfileStore;
use yoga_practice_client::{InMemoryHealthSource, JsonFileStore, MetricKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configure logging from env var `YOGA_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = std::env::var("YOGA_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!("yoga-practice-digest: log filter: {}", log_env);

    let cfg = Config::from_env().context("loading configuration")?;
    let local = JsonFileStore::open(&cfg.local_store_path)
        .with_context(|| format!("opening {}", cfg.local_store_path.display()))?;

    // Optional first argument: a JSON health export to read samples from.
    let health = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => InMemoryHealthSource::load_export(&path)
            .await
            .with_context(|| format!("loading health export {}", path.display()))?,
        None => InMemoryHealthSource::new(),
    };
    let mut metrics = health.metrics().await;
    if metrics.is_empty() {
        metrics = MetricKind::ALL.to_vec();
    }

    let session = PracticeSession::new(
        Arc::new(FirestoreProfileStore::from_config(&cfg)),
        health,
        Arc::new(local),
        default_catalog(),
        SessionSettings::from(&cfg),
    );

    if let Ok(user_id) = std::env::var("YOGA_USER_ID") {
        session
            .sign_in(&user_id)
            .await
            .with_context(|| format!("signing in {user_id}"))?;
    } else {
        tracing::info!("YOGA_USER_ID not set, building digest without a profile");
    }

    let digest = build_digest(&session, &metrics, chrono::Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&digest)?);
    Ok(())
}
