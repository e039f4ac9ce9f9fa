//! Application wiring: config load, pool creation, migrations, router, and
//! graceful shutdown. `App::run` serves the HTTP API directly -- there is
//! only one long-running service here, so no `ServiceManager`-style
//! indirection is needed.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use figment::providers::Env;
use figment::Figment;
use sqlx::postgres::PgPoolOptions;
use sqlx::ConnectOptions;
use tokio::signal;
use tracing::info;

use crate::config::Config;
use crate::state::AppState;
use crate::web::routes::create_router;

pub struct App {
    config: Config,
    db_pool: sqlx::PgPool,
    app_state: AppState,
}

impl App {
    pub async fn new() -> Result<Self, anyhow::Error> {
        let config: Config = Figment::new()
            .merge(Env::raw())
            .extract()
            .context("failed to load config")?;

        let connect_options = sqlx::postgres::PgConnectOptions::from_str(&config.database_url)
            .context("failed to parse DATABASE_URL")?
            .log_statements(tracing::log::LevelFilter::Debug)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect_with(connect_options)
            .await
            .context("failed to create database pool")?;

        info!(min_connections = 0, max_connections = 8, "database pool established");

        info!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("failed to run database migrations")?;
        info!("database migrations completed");

        let app_state = AppState::new(db_pool.clone(), config.extendable_min_days);

        Ok(App {
            config,
            db_pool,
            app_state,
        })
    }

    /// Exposes the pool for the CLI's one-shot admin subcommands, which run
    /// against the same migrated database without standing up the router.
    pub fn db_pool(&self) -> &sqlx::PgPool {
        &self.db_pool
    }

    /// Builds the router and serves it until a shutdown signal arrives, then
    /// waits up to `shutdown_timeout` seconds for in-flight requests to
    /// drain.
    pub async fn run(self) -> anyhow::Result<()> {
        let router = create_router(self.app_state);
        let listener = tokio::net::TcpListener::bind(&self.config.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.config.bind_addr))?;
        info!(addr = %self.config.bind_addr, "listening");

        let shutdown_timeout = Duration::from_secs(self.config.shutdown_timeout);
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
            .await
            .context("server error")?;

        self.db_pool.close().await;
        Ok(())
    }
}

async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(?timeout, "shutdown signal received, draining in-flight requests");
}
