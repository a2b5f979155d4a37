// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

use std::{env, net::SocketAddr};

use stellar_anchor::{api, AnchorConfig, AppState, Sep24Mount, Sep6Mount};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let config = match AnchorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let interactive_url = env::var("ANCHOR_INTERACTIVE_URL").unwrap_or_default();
    let sep24 = match Sep24Mount::new(interactive_url) {
        Ok(mount) => mount,
        Err(e) => {
            tracing::error!(error = %e, "ANCHOR_INTERACTIVE_URL is required for the SEP-24 mount");
            std::process::exit(1);
        }
    };

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize");
            std::process::exit(1);
        }
    };
    let state = state
        .mount_sep10()
        .mount_sep24(sep24)
        .mount_sep6(Sep6Mount::default());

    let sweeper = state.start_sweeper();
    let app = api::router(state.clone());

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8000".to_string())
        .parse()
        .unwrap_or(8000);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("failed to parse bind address");

    tracing::info!(%addr, domain = %state.config.domain, "anchor listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind TCP listener");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    // In-flight requests have drained; stop the background sweeper last.
    sweeper.shutdown();
    tracing::info!("shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
    tracing::info!("shutdown requested");
}
