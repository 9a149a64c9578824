// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Prometheus metrics for recycles and pool state
//!
//! Contains label types, recycle counters, and the metrics registry.

mod labels;
mod recycle;
mod registry;

/// Shared recycle outcome counters
pub use recycle::RecycleStats;

/// Prometheus metrics registry
pub use registry::MetricsRegistry;
