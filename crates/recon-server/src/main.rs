mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use recon_pipeline::Pipeline;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::{AuthState, TenantRateLimit},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(recon_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = recon_db::PoolConfig::from_app_config(&config);
    let pool = recon_db::connect_pool(&config.database_url, pool_config).await?;
    recon_db::run_migrations(&pool).await?;

    let pipeline = Pipeline::from_config(pool.clone(), &config)?;
    let _scheduler = scheduler::build_scheduler(pipeline.clone(), Arc::clone(&config)).await?;

    let auth = AuthState::from_env(matches!(config.env, recon_core::Environment::Development))?;
    let rate_limit = TenantRateLimit::per_minute(config.api_rate_limit_per_minute);
    let app = build_app(AppState { pool, pipeline }, auth, rate_limit);

    tracing::info!(addr = %config.bind_addr, env = %config.env, "recon-server listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
