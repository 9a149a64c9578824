// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! HTTP API module for the connection refresher
//!
//! Every route runs behind [`RefreshConnectionLayer`], so each request
//! recycles the configured connection handlers once its response is sent.
//!
//! # Endpoints
//! - `GET /health` — health check
//! - `GET /metrics` — Prometheus metrics
//! - `GET /schema` — schema cached on the target handler's connection

pub mod handlers;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::metrics::MetricsRegistry;
use crate::pool::TrackedPool;
use crate::refresh::{RecyclerConfig, Recycler, RefreshConnectionLayer};
use crate::registry::ConnectionHandlers;

/// Recycler over every configured handler, caching one handler's schema
pub type AppRecycler = Recycler<ConnectionHandlers<TrackedPool>, TrackedPool>;

/// Application state shared with endpoints
pub struct AppState {
    pub config: Config,
    pub metrics: MetricsRegistry,
    pub handlers: Arc<ConnectionHandlers<TrackedPool>>,
    pub schema_cache_target: Arc<TrackedPool>,
    pub recycler: Arc<AppRecycler>,
}

impl AppState {
    /// Builds one pool per configured handler and the recycler over them
    ///
    /// The schema cache target name is resolved here, once.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let pools = config
            .connection_handlers
            .iter()
            .map(|name| {
                let pool = TrackedPool::with_tables(name.clone(), config.schema_tables.clone())
                    .max_idle_time(config.pool_max_idle_time());
                (name.clone(), Arc::new(pool))
            })
            .collect();
        let handlers = Arc::new(ConnectionHandlers::new(pools)?);

        let schema_cache_target = handlers.get(&config.schema_cache_target).ok_or_else(|| {
            AppError::Config(format!(
                "Unknown schema cache target '{}'",
                config.schema_cache_target
            ))
        })?;

        let metrics = MetricsRegistry::new();
        let recycler = Arc::new(Recycler::new(
            RecyclerConfig::new(handlers.clone())
                .max_requests(config.max_requests)
                .schema_cache_target(schema_cache_target.clone())
                .stats(metrics.recycle_stats()),
        ));

        Ok(Self {
            config,
            metrics,
            handlers,
            schema_cache_target,
            recycler,
        })
    }

    /// Every handler's pool, for the cleanup task
    pub fn pools(&self) -> Vec<Arc<TrackedPool>> {
        self.handlers.iter().map(|(_, pool)| pool.clone()).collect()
    }
}

/// Creates the main Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let refresh = RefreshConnectionLayer::from_recycler(state.recycler.clone());

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/schema", get(handlers::schema_handler))
        .layer(refresh)
        .with_state(state)
}
