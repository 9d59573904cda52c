use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use milkwise_backend::{
    config::{AppConfig, StorageConfig},
    routes,
    services::{
        classifier::EscalationClassifier,
        completion::{CompletionService, OpenAiCompletion},
        persistence::{JsonLinesSink, PersistenceSink, SupabaseSink},
    },
    state::AppState,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;

    let classifier = match &config.phrases_path {
        Some(path) => EscalationClassifier::from_file(path)
            .with_context(|| format!("loading escalation phrases from {}", path.display()))?,
        None => EscalationClassifier::default(),
    };

    let completion: Arc<dyn CompletionService> =
        Arc::new(OpenAiCompletion::new(config.openai.clone()).context("building completion client")?);

    let sink: Arc<dyn PersistenceSink> = match &config.storage {
        StorageConfig::Supabase { url, key } => {
            info!(%url, "persisting to supabase");
            Arc::new(SupabaseSink::new(url, key).context("building supabase client")?)
        }
        StorageConfig::JsonLines { path } => {
            info!(path = %path.display(), "persisting to local chat log");
            Arc::new(JsonLinesSink::new(path.clone()))
        }
    };

    let mut state = AppState::new(config.session_ttl, classifier, completion, sink);
    if let Some(key) = &config.admin_key {
        state = state.with_admin_key(key.clone());
    }
    let state = Arc::new(state);

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = sessions.purge_expired().await;
            if removed > 0 {
                info!(removed, "purged idle sessions");
            }
        }
    });

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, model = %config.openai.model, "MilkWise backend listening");
    axum::serve(listener, app).await?;
    Ok(())
}
