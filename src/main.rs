use anyhow::Context;
use bonustree::notify::{LogNotificationSink, NotificationSink, WebhookNotificationSink};
use bonustree::{api, config::Config, db::init_db, Orchestrator, Repository};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));

    let notifier: Arc<dyn NotificationSink> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotificationSink::new(url.clone())),
        None => Arc::new(LogNotificationSink),
    };
    let orchestrator = Arc::new(Orchestrator::new(repo, &config, notifier));

    if config.matching_interval_secs > 0 {
        orchestrator.spawn_scheduler(Duration::from_secs(config.matching_interval_secs));
        tracing::info!(
            interval_secs = config.matching_interval_secs,
            "Matching scheduler started"
        );
    } else {
        tracing::info!("Matching scheduler disabled");
    }

    let app = api::create_router(api::AppState::new(config, orchestrator));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
