// ABOUTME: Liveness and readiness endpoints for deployment probes
// ABOUTME: Answers without touching the store or any external provider
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

//! Health endpoints

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

/// Health routes
pub struct HealthRoutes;

impl HealthRoutes {
    /// Router for `/health` and `/ready`
    #[must_use]
    pub fn routes() -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/ready", get(ready))
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn ready() -> Json<Value> {
    Json(json!({
        "status": "ready",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
