#![allow(dead_code)]

mod chatlog;
mod client;
mod data;
mod message;
mod room;
mod roomlist;
mod routes;
mod session;
mod state;
mod telnet;

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info, warn};

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .is_some_and(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

/// Resolve when the process receives an interrupt. If the handler cannot be
/// installed, stay pending so the server keeps running.
async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install interrupt handler");
        std::future::pending::<()>().await;
    }
}

/// Serve-shutdown hook: once `signal` resolves, the listener stops accepting
/// and the room reaper is told to stop.
async fn shutdown_after(signal: impl Future<Output = ()>, rooms: Arc<roomlist::RoomList>) {
    signal.await;
    info!("shutdown signal received");
    rooms.close();
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let port: u16 = env_parse("PORT", 3000);
    let telnet_port = std::env::var("TELNET_PORT").unwrap_or_else(|_| "6000".into());
    let origin = std::env::var("ORIGIN").unwrap_or_else(|_| "*".into());
    let max_rooms: usize = env_parse("MAX_ROOMS", 100);
    let disable_new_accounts = env_bool("DISABLE_NEW_ACCOUNTS");

    // Postgres when configured, in-memory otherwise.
    let data = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = data::postgres::init_pool(&url)
                .await
                .expect("database init failed");
            info!("using postgres data store");
            data::DataFactory::postgres(pool, disable_new_accounts)
        }
        Err(_) => {
            warn!("DATABASE_URL not set — account data is in-memory only");
            data::DataFactory::memory(disable_new_accounts)
        }
    };

    let chatlog = match std::env::var("CHAT_LOG") {
        Ok(path) => {
            info!(%path, "chat log enabled");
            chatlog::ChatLog::open(&path).expect("chat log open failed")
        }
        Err(_) => chatlog::ChatLog::disabled(),
    };

    let rooms = roomlist::RoomList::new(max_rooms);
    let sessions = session::ClientMap::new();
    let state = state::AppState::new(Arc::clone(&rooms), sessions, data, chatlog, origin);

    // Telnet listener, unless disabled with TELNET_PORT="".
    if !telnet_port.is_empty() {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{telnet_port}"))
            .await
            .expect("telnet bind failed");
        info!(port = %telnet_port, "telnet server listening");
        tokio::spawn(telnet::run(listener, state.clone()));
    }

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    info!(%port, "parlor listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_after(interrupt(), rooms))
        .await
        .expect("server failed");
}
