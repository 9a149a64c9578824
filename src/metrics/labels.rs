// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Label types for Prometheus metrics

use prometheus_client::encoding::EncodeLabelSet;

/// Outcome label for recycle counters (`full`, `partial`, `skipped`)
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RecycleLabels {
    pub kind: String,
}

/// Connection handler label for pool gauges
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PoolLabels {
    pub handler: String,
}

impl RecycleLabels {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
        }
    }
}

impl PoolLabels {
    pub fn new(handler: &str) -> Self {
        Self {
            handler: handler.to_string(),
        }
    }
}
