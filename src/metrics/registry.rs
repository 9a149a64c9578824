// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Metrics registry and update logic

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::labels::PoolLabels;
use super::recycle::RecycleStats;
use crate::error::Result;
use crate::pool::PoolStats;

#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Mutex<Registry>>,
    recycles: RecycleStats,
    // pool gauges, refreshed from pool snapshots
    pool_size: Family<PoolLabels, Gauge>,
    pool_active: Family<PoolLabels, Gauge>,
    pool_disconnected: Family<PoolLabels, Gauge>,
    schema_introspections: Family<PoolLabels, Gauge>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let recycles = RecycleStats::new();
        registry.register(
            "refresh_connection_recycles",
            "Connection recycles by outcome",
            recycles.family(),
        );

        let pool_size = Family::<PoolLabels, Gauge>::default();
        registry.register(
            "refresh_connection_pool_size",
            "Open connections held by the handler",
            pool_size.clone(),
        );
        let pool_active = Family::<PoolLabels, Gauge>::default();
        registry.register(
            "refresh_connection_pool_active",
            "Connections currently leased from the handler",
            pool_active.clone(),
        );
        let pool_disconnected = Family::<PoolLabels, Gauge>::default();
        registry.register(
            "refresh_connection_pool_disconnected",
            "Connections disconnected by the handler since startup",
            pool_disconnected.clone(),
        );
        let schema_introspections = Family::<PoolLabels, Gauge>::default();
        registry.register(
            "refresh_connection_schema_introspections",
            "Schema introspections performed by the handler since startup",
            schema_introspections.clone(),
        );

        Self {
            registry: Arc::new(Mutex::new(registry)),
            recycles,
            pool_size,
            pool_active,
            pool_disconnected,
            schema_introspections,
        }
    }

    /// Recycle counters registered with this registry
    pub fn recycle_stats(&self) -> RecycleStats {
        self.recycles.clone()
    }

    pub async fn encode_metrics(&self) -> Result<String> {
        let registry = self.registry.lock().await;
        let mut buffer = String::new();
        encode(&mut buffer, &registry)?;
        Ok(buffer)
    }

    pub fn update_pool_stats(&self, handler: &str, stats: &PoolStats) {
        let labels = PoolLabels::new(handler);
        #[allow(clippy::cast_possible_wrap)]
        {
            self.pool_size.get_or_create(&labels).set(stats.total as i64);
            self.pool_active.get_or_create(&labels).set(stats.active as i64);
            self.pool_disconnected
                .get_or_create(&labels)
                .set(stats.disconnected as i64);
            self.schema_introspections
                .get_or_create(&labels)
                .set(stats.introspections as i64);
        }
    }
}
