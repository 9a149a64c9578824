// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for convenient use.
//! Users of the library can import everything they need with:
//!
//! ```rust
//! use refresh_connection::prelude::*;
//! ```

// Core types
pub use crate::config::Config;
pub use crate::error::{AppError, Result};

// Middleware
pub use crate::refresh::{
    RecycleKind, Recycler, RecyclerConfig, RefreshConnection, RefreshConnectionLayer, TestRequest,
};

// Collaborators
pub use crate::registry::{ConnectionHandle, ConnectionHandlers, ConnectionRegistry, SchemaCache};

// In-process registry
pub use crate::pool::{SchemaSnapshot, TrackedPool};

// Metrics
pub use crate::metrics::{MetricsRegistry, RecycleStats};
