// ABOUTME: Route module organization for the Revu server HTTP endpoints
// ABOUTME: Assembles domain routers into one application router with shared middleware
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

//! Route modules for the Revu server
//!
//! Each domain module contains route definitions and handlers; this module
//! assembles them into the application router and attaches the shared
//! middleware stack (tracing, request ids, CORS).

/// Chat turn pipeline and conversation management routes
pub mod chat;
/// Health check and system status routes
pub mod health;

pub use chat::ChatRoutes;
pub use health::HealthRoutes;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::context::ServerResources;

/// Build the application router with all routes and middleware
#[must_use]
pub fn create_router(resources: Arc<ServerResources>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(ChatRoutes::routes(resources))
        .merge(HealthRoutes::routes())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
}
