//! `server` and `monitor`.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use super::{CliResult, OrExit};
use crate::auth::SessionBackend;
use crate::config::{Config, SessionStoreKind};
use crate::db::{PgUserStore, connect_pool};
use crate::middleware::RequestStats;
use crate::routes::build_router;
use crate::state::AppState;
use crate::utils;

/// Clears the terminal and moves the cursor home.
const CLEAR_SCREEN: &str = "\x1b[H\x1b[2J";

/// Serve HTTP until Ctrl+C or SIGTERM, then stop the background tasks.
pub(super) async fn serve(config: Config, stats: Option<Arc<RequestStats>>) -> CliResult {
    info!(
        database = %config.database.display_target(),
        "Starting portico v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = connect_pool(&config.database);
    let users = Arc::new(PgUserStore::new(pool.clone()));

    let session_backend = match config.session.store {
        SessionStoreKind::Memory => SessionBackend::memory(),
        SessionStoreKind::Postgres => SessionBackend::postgres(pool.clone())
            .await
            .or_exit(exitcode::UNAVAILABLE, "could not prepare the session table")?,
    };
    info!(store = ?config.session.store, "Session store ready");

    let addr = config.server_addr();
    let mut state =
        AppState::new(users, session_backend, config).or_exit(exitcode::CONFIG, "invalid state")?;
    if let Some(stats) = stats {
        state = state.with_request_stats(stats);
    }
    let app = build_router(state.clone()).or_exit(exitcode::CONFIG, "could not build router")?;

    let listener = TcpListener::bind(&addr)
        .await
        .or_exit(exitcode::UNAVAILABLE, "could not bind the listen address")?;
    info!("Server listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(utils::shutdown_signal())
    .await
    .or_exit(exitcode::SOFTWARE, "server error")?;

    info!("HTTP server stopped, shutting down background tasks...");
    state.shutdown().await;
    pool.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Serve HTTP and redraw the per-route statistics table every second.
pub(super) async fn monitor(config: Config) -> CliResult {
    let stats = Arc::new(RequestStats::new());

    let printer = {
        let stats = stats.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                let mut out = std::io::stdout().lock();
                let drawn = write!(out, "{CLEAR_SCREEN}")
                    .and_then(|()| stats.write_table(&mut out))
                    .and_then(|()| out.flush());
                if drawn.is_err() {
                    break;
                }
            }
        })
    };

    let result = serve(config, Some(stats)).await;
    printer.abort();
    result
}
