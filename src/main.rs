use std::{sync::Arc, time::Duration};

use axum::http::HeaderValue;
use calcdir_auth::{
    bootstrap,
    config::AppConfig,
    migration::{Migrator, MigratorTrait},
    password::Passwords,
    repository::AdminRepository,
    routes::{router, RouterOptions},
    session::{spawn_expired_sweep, CookieSettings, SessionCookies},
    session_store::DbSessionStore,
    AppState,
};
use dotenvy::dotenv;
use sea_orm::{ConnectOptions, Database};
use secrecy::ExposeSecret;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    info!(
        production = config.production,
        addr = %config.socket_addr(),
        "configuration loaded"
    );

    let mut opt = ConnectOptions::new(config.database_url());
    opt.max_connections(config.db_max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    let db = Database::connect(opt).await?;
    info!("connected to database");

    Migrator::up(&db, None).await?;
    info!("migrations applied");

    let passwords = Passwords::default();
    bootstrap::ensure_primary_admin(
        &AdminRepository::new(db.clone()),
        &passwords,
        &config.bootstrap_admin_username,
        config.bootstrap_admin_password.expose_secret(),
    )
    .await?;

    let store = DbSessionStore::new(db.clone());
    let sweeper = spawn_expired_sweep(store.clone(), config.sweep_interval);

    let cookies = SessionCookies::new(
        config.session_secret.expose_secret().as_bytes(),
        CookieSettings::for_environment(config.production),
    );
    let state = AppState::new(db.clone(), Arc::new(store), cookies, passwords);

    let allowed_origins = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let app = router(
        state,
        RouterOptions {
            expose_error_details: config.expose_error_details,
            allowed_origins,
        },
    );

    let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
    info!("server listening on http://{}", config.socket_addr());
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    db.close().await?;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
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
                warn!(error = %e, "failed to install SIGTERM handler");
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
    info!("shutdown signal received");
}
