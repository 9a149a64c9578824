// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Connection recycling
//!
//! A [`Recycler`] clears a [`ConnectionRegistry`] once per request. Every
//! `max_requests`-th recycle disconnects all pooled connections; the rest only
//! release connections held by finished requests back to the pool. The schema
//! cache of the live connection is carried across recycles so it is not
//! introspected again.
//!
//! [`RefreshConnectionLayer`] runs the recycler around a `tower` service.

mod body;
mod layer;

pub use body::RecycleBody;
pub use layer::{RefreshConnection, RefreshConnectionLayer, ResponseFuture, TestRequest};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::metrics::RecycleStats;
use crate::registry::{ConnectionHandle, ConnectionRegistry, SchemaCache, SchemaCacheOf};

/// Recycle every request unless configured otherwise
pub const DEFAULT_MAX_REQUESTS: usize = 1;

/// Which clear a recycle performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecycleKind {
    /// Every pooled connection was disconnected
    All,
    /// Connections held by finished requests were released, none disconnected
    Active,
}

/// Recycler settings, fixed once the recycler is built
pub struct RecyclerConfig<R, T = R> {
    pub max_requests: usize,
    pub registry: Arc<R>,
    pub schema_cache_target: Arc<T>,
    pub stats: RecycleStats,
}

impl<R> RecyclerConfig<R, R> {
    /// Recycles `registry` on every request, caching its own schema
    pub fn new(registry: Arc<R>) -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            schema_cache_target: registry.clone(),
            registry,
            stats: RecycleStats::new(),
        }
    }
}

impl<R, T> RecyclerConfig<R, T> {
    #[must_use]
    pub fn max_requests(mut self, max_requests: usize) -> Self {
        self.max_requests = max_requests;
        self
    }

    /// Reads and restores the schema cache through `target` instead
    pub fn schema_cache_target<U>(self, target: Arc<U>) -> RecyclerConfig<R, U> {
        RecyclerConfig {
            max_requests: self.max_requests,
            registry: self.registry,
            schema_cache_target: target,
            stats: self.stats,
        }
    }

    /// Records outcomes into `stats`, e.g. counters from a metrics registry
    #[must_use]
    pub fn stats(mut self, stats: RecycleStats) -> Self {
        self.stats = stats;
        self
    }
}

/// Per-middleware recycling state
pub struct Recycler<R, T = R>
where
    T: ConnectionRegistry,
{
    config: RecyclerConfig<R, T>,
    remaining: Mutex<usize>,
    cached_schema: Mutex<Option<SchemaCacheOf<T>>>,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<R, T> Recycler<R, T>
where
    R: ConnectionRegistry,
    T: ConnectionRegistry,
{
    pub fn new(config: RecyclerConfig<R, T>) -> Self {
        let remaining = Mutex::new(config.max_requests);
        Self {
            config,
            remaining,
            cached_schema: Mutex::new(None),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.config.max_requests
    }

    /// Requests left before the next full clear
    pub fn remaining(&self) -> usize {
        *lock(&self.remaining)
    }

    pub fn stats(&self) -> &RecycleStats {
        &self.config.stats
    }

    /// Snapshot carried over from the last recycle
    pub fn cached_schema(&self) -> Option<SchemaCacheOf<T>> {
        lock(&self.cached_schema).clone()
    }

    /// Installs the carried-over schema cache on the target's live connection
    pub fn restore_schema_cache(&self) {
        let Some(cache) = self.cached_schema() else {
            return;
        };
        self.config
            .schema_cache_target
            .current_connection()
            .set_schema_cache(cache);
    }

    /// Preserves the schema cache, then clears the registry
    pub fn recycle(&self) -> RecycleKind {
        self.preserve_schema_cache();

        if self.should_clear_all() {
            self.config.registry.clear_all_connections();
            self.config.stats.record_full();
            tracing::debug!("Recycled all connections");
            RecycleKind::All
        } else {
            self.config.registry.clear_active_connections();
            self.config.stats.record_partial();
            tracing::debug!(
                "Recycled idle connections, full recycle in {} request(s)",
                self.remaining()
            );
            RecycleKind::Active
        }
    }

    /// Counts a request that opted out of recycling
    pub fn skip(&self) {
        self.config.stats.record_skipped();
        tracing::trace!("Skipping connection recycle for test request");
    }

    /// Whether this recycle should disconnect every connection
    ///
    /// True on every `max_requests`-th call; always true when
    /// `max_requests <= 1`.
    pub fn should_clear_all(&self) -> bool {
        let max_requests = self.config.max_requests;
        if max_requests <= 1 {
            return true;
        }

        let mut remaining = lock(&self.remaining);
        *remaining = remaining.saturating_sub(1);
        let clear = *remaining == 0;
        if clear {
            *remaining = max_requests;
        }
        clear
    }

    fn preserve_schema_cache(&self) {
        let mut cache = self
            .config
            .schema_cache_target
            .current_connection()
            .schema_cache();

        let mut cached = lock(&self.cached_schema);
        // A freshly opened connection has nothing to carry over
        if cache.is_empty() && cached.is_some() {
            return;
        }
        cache.detach_connection();
        *cached = Some(cache);
    }
}

/// Type-erased recycler held by response guards
pub(crate) trait Recycle: Send + Sync {
    fn recycle(&self) -> RecycleKind;

    fn skip(&self);
}

impl<R, T> Recycle for Recycler<R, T>
where
    R: ConnectionRegistry,
    T: ConnectionRegistry,
{
    fn recycle(&self) -> RecycleKind {
        Recycler::recycle(self)
    }

    fn skip(&self) {
        Recycler::skip(self);
    }
}
