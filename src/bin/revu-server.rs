// ABOUTME: Server binary for the Revu review-grounded chat backend
// ABOUTME: Loads configuration, opens the store, and serves the HTTP router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

//! # Revu Server Binary
//!
//! Starts the chat backend with environment-driven configuration.

use anyhow::Result;
use clap::Parser;
use revu_server::{
    config::environment::ServerConfig,
    context::ServerResources,
    database::{self, ChatStore},
    logging,
    routes::create_router,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "revu-server")]
#[command(about = "Revu - review-grounded chat backend")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;

    info!("Starting Revu server");
    info!("{}", config.summary());

    let pool = database::connect(&config.database.url).await?;
    info!("Conversation store ready");

    let http_port = config.http_port;
    let resources = Arc::new(ServerResources::new(config, ChatStore::new(pool))?);
    let router = create_router(resources);

    info!("Endpoints: POST /api/chat, /api/chat/conversations, /api/shared/:id, /health");

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", http_port)).await?;
    info!("Listening on port {http_port}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}
