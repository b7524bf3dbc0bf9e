mod config;
mod db;
mod error;
mod rate_limit;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;
use std::time::Duration;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() {
    // A missing .env is fine.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let port = config.port;

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    if let Some(admin) = &config.admin_bootstrap {
        services::auth::bootstrap_admin(&pool, &admin.username, &admin.password)
            .await
            .expect("admin bootstrap failed");
    }

    let blobs = services::blob::build_blob_store(&config.blob).await;
    let _sweeper = services::session::spawn_session_sweeper(pool.clone(), SESSION_SWEEP_INTERVAL);

    let state = state::AppState::new(pool, blobs, config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "proofboard listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server failed");
}
