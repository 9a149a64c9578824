// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Recycle outcome counters

use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;

use super::labels::RecycleLabels;

pub(crate) const KIND_FULL: &str = "full";
pub(crate) const KIND_PARTIAL: &str = "partial";
pub(crate) const KIND_SKIPPED: &str = "skipped";

/// Counters for recycle outcomes.
///
/// Cloning shares the underlying counters, so a recycler and the metrics
/// registry can hold the same instance.
#[derive(Clone, Debug, Default)]
pub struct RecycleStats {
    recycles: Family<RecycleLabels, Counter>,
}

impl RecycleStats {
    #[must_use]
    pub fn new() -> Self {
        let stats = Self::default();
        // Expose all outcomes from the start so rates work before the first recycle
        for kind in [KIND_FULL, KIND_PARTIAL, KIND_SKIPPED] {
            let _ = stats.recycles.get_or_create(&RecycleLabels::new(kind));
        }
        stats
    }

    pub(crate) fn family(&self) -> Family<RecycleLabels, Counter> {
        self.recycles.clone()
    }

    pub fn record_full(&self) {
        self.inc(KIND_FULL);
    }

    pub fn record_partial(&self) {
        self.inc(KIND_PARTIAL);
    }

    pub fn record_skipped(&self) {
        self.inc(KIND_SKIPPED);
    }

    /// Number of recycles that cleared every connection
    pub fn full(&self) -> u64 {
        self.get(KIND_FULL)
    }

    /// Number of recycles that cleared only checked-in connections
    pub fn partial(&self) -> u64 {
        self.get(KIND_PARTIAL)
    }

    /// Number of test requests that skipped recycling
    pub fn skipped(&self) -> u64 {
        self.get(KIND_SKIPPED)
    }

    fn inc(&self, kind: &str) {
        self.recycles.get_or_create(&RecycleLabels::new(kind)).inc();
    }

    fn get(&self, kind: &str) -> u64 {
        self.recycles.get_or_create(&RecycleLabels::new(kind)).get()
    }
}
