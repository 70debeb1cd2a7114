mod api;
mod middleware;
mod scheduler;

use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit, AppState},
    middleware::ApiKeys,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = foresight_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = foresight_db::PoolConfig::from_app_config(&config);
    let pool = foresight_db::connect_pool(&config.database_url, pool_config).await?;
    foresight_db::run_migrations(&pool).await?;

    let _scheduler = scheduler::build_scheduler(pool.clone()).await?;

    let classifier = foresight_learning::SentimentClassifier::new(
        config.sentiment_oracle_url.as_deref(),
        Duration::from_secs(config.sentiment_timeout_secs),
    );

    let keys = ApiKeys::from_env(matches!(
        config.env,
        foresight_core::Environment::Development
    ))?;
    let app = build_app(AppState { pool, classifier }, keys, default_rate_limit());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
