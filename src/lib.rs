// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! # Refresh Connection
//!
//! Tower middleware that periodically recycles the connections held by a
//! database connection pool.
//!
//! Long-running servers keep pooled connections open until something in the
//! network (load balancer idle timeouts, database connection limits) quietly
//! kills them. [`RefreshConnectionLayer`] clears the pool after every request:
//! every `max_requests`-th request disconnects all pooled connections, the
//! others only disconnect connections that are checked in. The schema cache of
//! the live connection is carried over so it is not introspected again.
//!
//! ## Main modules
//! - `api`: HTTP API handlers
//! - `config`: configuration management
//! - `error`: error types
//! - `metrics`: recycle counters and pool gauges
//! - `pool`: in-process connection registry
//! - `refresh`: the recycler and its tower layer
//! - `registry`: connection registry collaborator traits
//! - `prelude`: commonly used types and traits

mod api;
mod config;
mod error;
mod metrics;
mod pool;
mod refresh;
mod registry;
pub mod prelude;

// Re-export commonly used types
/// Application configuration
pub use config::Config;

/// Application error and result type
pub use error::{AppError, Result};

/// HTTP API router and state
pub use api::{AppRecycler, AppState, create_router};

/// Metrics registry and recycle counters
pub use metrics::{MetricsRegistry, RecycleStats};

/// In-process connection registry
pub use pool::{
    PoolStats, PooledConnection, SchemaSnapshot, TableDefinitions, TrackedPool,
    start_pool_cleanup_task,
};

/// Recycler and tower middleware
pub use refresh::{
    DEFAULT_MAX_REQUESTS, RecycleBody, RecycleKind, Recycler, RecyclerConfig, RefreshConnection,
    RefreshConnectionLayer, ResponseFuture, TestRequest,
};

/// Connection registry collaborators
pub use registry::{
    ConnectionHandle, ConnectionHandlers, ConnectionRegistry, SchemaCache, SchemaCacheOf,
};
