// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! In-process connection registry
//!
//! [`TrackedPool`] keeps the bookkeeping side of a pool (which connections are
//! open, which are leased, what schema each one has cached) so the refresher
//! can be wired into a server and exercised without a database.

mod cleanup;
mod schema;

pub use cleanup::start_pool_cleanup_task;
pub use schema::{SchemaSnapshot, TableDefinitions};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::registry::{ConnectionHandle, ConnectionRegistry};

/// Default idle time after which a checked-in connection is reaped
pub const DEFAULT_MAX_IDLE_TIME: Duration = Duration::from_secs(300);

/// Connection registry tracking leases and per-connection schema caches
pub struct TrackedPool {
    shared: Arc<PoolShared>,
    max_idle_time: Duration,
}

struct PoolShared {
    name: String,
    tables: TableDefinitions,
    connections: Mutex<BTreeMap<u64, PooledEntry>>,
    next_id: AtomicU64,
    disconnected: AtomicU64,
    introspections: AtomicU64,
}

struct PooledEntry {
    last_used: Instant,
    in_use: bool,
    schema_cache: SchemaSnapshot,
}

/// Point-in-time pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Open connections
    pub total: usize,
    /// Connections leased right now
    pub active: usize,
    pub opened: u64,
    pub disconnected: u64,
    pub introspections: u64,
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, BTreeMap<u64, PooledEntry>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn disconnect(&self, count: usize) {
        self.disconnected.fetch_add(count as u64, Ordering::Relaxed);
    }
}

impl TrackedPool {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_tables(name, TableDefinitions::new())
    }

    /// Creates a pool whose connections introspect `tables` on first schema access
    pub fn with_tables(name: impl Into<String>, tables: TableDefinitions) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                name: name.into(),
                tables,
                connections: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
                disconnected: AtomicU64::new(0),
                introspections: AtomicU64::new(0),
            }),
            max_idle_time: DEFAULT_MAX_IDLE_TIME,
        }
    }

    #[must_use]
    pub fn max_idle_time(mut self, max_idle_time: Duration) -> Self {
        self.max_idle_time = max_idle_time;
        self
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Leases a connection: the lowest-numbered idle one, or a new one
    pub fn checkout(&self) -> PooledConnection {
        let mut pool = self.shared.lock();

        let idle = pool
            .iter_mut()
            .find(|(_, entry)| !entry.in_use)
            .map(|(id, entry)| {
                entry.in_use = true;
                entry.last_used = Instant::now();
                *id
            });

        let id = match idle {
            Some(id) => {
                tracing::trace!("Reusing connection {} from pool '{}'", id, self.name());
                id
            }
            None => {
                let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Opening connection {} in pool '{}'", id, self.name());
                pool.insert(
                    id,
                    PooledEntry {
                        last_used: Instant::now(),
                        in_use: true,
                        schema_cache: SchemaSnapshot::default(),
                    },
                );
                id
            }
        };

        PooledConnection {
            pool: self.shared.clone(),
            id,
        }
    }

    /// Get pool statistics for metrics
    pub fn stats(&self) -> PoolStats {
        let pool = self.shared.lock();
        PoolStats {
            total: pool.len(),
            active: pool.values().filter(|entry| entry.in_use).count(),
            opened: self.shared.next_id.load(Ordering::Relaxed) - 1,
            disconnected: self.shared.disconnected.load(Ordering::Relaxed),
            introspections: self.shared.introspections.load(Ordering::Relaxed),
        }
    }

    /// Clean up idle connections past `max_idle_time`
    pub fn cleanup(&self) {
        let mut pool = self.shared.lock();
        let before = pool.len();
        pool.retain(|id, entry| {
            let should_keep = entry.in_use || entry.last_used.elapsed() < self.max_idle_time;
            if !should_keep {
                tracing::debug!("Cleaning up expired connection: {}", id);
            }
            should_keep
        });
        self.shared.disconnect(before - pool.len());
    }
}

impl ConnectionRegistry for TrackedPool {
    type Connection = PooledConnection;

    fn clear_all_connections(&self) {
        let mut pool = self.shared.lock();
        let count = pool.len();
        pool.clear();
        self.shared.disconnect(count);
        tracing::debug!(
            "Disconnected all {} connection(s) in pool '{}'",
            count,
            self.name()
        );
    }

    fn clear_active_connections(&self) {
        // Handles check themselves in on drop; open connections stay open
        let pool = self.shared.lock();
        let leased = pool.values().filter(|entry| entry.in_use).count();
        tracing::debug!(
            "Released connections in pool '{}': {} idle, {} still leased",
            self.name(),
            pool.len() - leased,
            leased
        );
    }

    fn current_connection(&self) -> PooledConnection {
        self.checkout()
    }
}

/// A leased connection; checks itself back in on drop
pub struct PooledConnection {
    pool: Arc<PoolShared>,
    id: u64,
}

impl PooledConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the pool still holds this connection open
    pub fn is_connected(&self) -> bool {
        self.pool.lock().contains_key(&self.id)
    }

    /// Returns the cached schema, introspecting when the cache is empty
    pub fn schema(&self) -> SchemaSnapshot {
        let mut pool = self.pool.lock();
        let Some(entry) = pool.get_mut(&self.id) else {
            tracing::warn!("Schema requested on disconnected connection {}", self.id);
            return SchemaSnapshot::default();
        };

        if entry.schema_cache.is_empty() && !self.pool.tables.is_empty() {
            self.pool.introspections.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "Introspecting schema on connection {} in pool '{}'",
                self.id,
                self.pool.name
            );
            entry.schema_cache = SchemaSnapshot::new(self.pool.tables.clone(), self.id);
        }

        entry.schema_cache.clone()
    }
}

impl ConnectionHandle for PooledConnection {
    type SchemaCache = SchemaSnapshot;

    fn schema_cache(&self) -> SchemaSnapshot {
        self.pool
            .lock()
            .get(&self.id)
            .map(|entry| entry.schema_cache.clone())
            .unwrap_or_default()
    }

    fn set_schema_cache(&self, cache: SchemaSnapshot) {
        if let Some(entry) = self.pool.lock().get_mut(&self.id) {
            entry.schema_cache = cache.attach(self.id);
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        // Cleared connections are already gone; nothing to check in
        if let Some(entry) = self.pool.lock().get_mut(&self.id) {
            entry.in_use = false;
            entry.last_used = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaCache;

    fn users_table() -> TableDefinitions {
        TableDefinitions::from([(
            "users".to_string(),
            vec!["id".to_string(), "email".to_string()],
        )])
    }

    #[test]
    fn test_pool_new() {
        let pool = TrackedPool::new("primary");
        assert_eq!(pool.name(), "primary");
        assert_eq!(pool.max_idle_time, DEFAULT_MAX_IDLE_TIME);
        assert_eq!(pool.stats(), PoolStats::default());
    }

    #[test]
    fn test_checkout_and_checkin() {
        let pool = TrackedPool::new("primary");

        let conn = pool.checkout();
        assert_eq!(conn.id(), 1);
        assert_eq!(pool.stats().active, 1);

        drop(conn);
        let stats = pool.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.active, 0);

        // Idle connection is reused
        assert_eq!(pool.checkout().id(), 1);
        assert_eq!(pool.stats().opened, 1);
    }

    #[test]
    fn test_concurrent_leases_open_new_connections() {
        let pool = TrackedPool::new("primary");
        let first = pool.checkout();
        let second = pool.checkout();

        assert_ne!(first.id(), second.id());
        assert_eq!(pool.stats().active, 2);
    }

    #[test]
    fn test_clear_all_disconnects_leased() {
        let pool = TrackedPool::new("primary");
        let leased = pool.checkout();
        drop(pool.checkout());

        pool.clear_all_connections();

        assert!(!leased.is_connected());
        let stats = pool.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.disconnected, 2);

        drop(leased);
        assert_eq!(pool.stats().total, 0);
    }

    #[test]
    fn test_clear_active_keeps_leased() {
        let pool = TrackedPool::new("primary");
        let leased = pool.checkout();
        let idle = pool.checkout();
        drop(idle);

        pool.clear_active_connections();

        assert!(leased.is_connected());
        let stats = pool.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.disconnected, 0);
    }

    #[test]
    fn test_released_connection_is_reused_with_schema() {
        let pool = TrackedPool::with_tables("primary", users_table());
        let conn = pool.checkout();
        let id = conn.id();
        let _ = conn.schema();
        drop(conn);

        pool.clear_active_connections();

        let conn = pool.checkout();
        assert_eq!(conn.id(), id);
        assert!(conn.schema_cache().columns("users").is_some());
        let _ = conn.schema();
        let stats = pool.stats();
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.disconnected, 0);
        assert_eq!(stats.introspections, 1);
    }

    #[test]
    fn test_schema_introspected_once_per_connection() {
        let pool = TrackedPool::with_tables("primary", users_table());

        let conn = pool.checkout();
        let schema = conn.schema();
        assert_eq!(schema.columns("users").unwrap().len(), 2);
        assert_eq!(schema.connection_id(), Some(conn.id()));

        let _ = conn.schema();
        assert_eq!(pool.stats().introspections, 1);
    }

    #[test]
    fn test_installed_schema_skips_introspection() {
        let pool = TrackedPool::with_tables("primary", users_table());

        let mut snapshot = pool.checkout().schema();
        snapshot.detach_connection();
        pool.clear_all_connections();

        let conn = pool.checkout();
        conn.set_schema_cache(snapshot);
        assert_eq!(conn.schema_cache().connection_id(), Some(conn.id()));
        assert!(conn.schema().columns("users").is_some());
        assert_eq!(pool.stats().introspections, 1);
    }

    #[test]
    fn test_schema_cache_on_disconnected_connection_is_empty() {
        let pool = TrackedPool::with_tables("primary", users_table());
        let conn = pool.checkout();
        let _ = conn.schema();
        pool.clear_all_connections();

        assert!(conn.schema_cache().is_empty());
        assert!(conn.schema().is_empty());
    }

    #[test]
    fn test_cleanup_reaps_expired_idle() {
        let pool = TrackedPool::new("primary").max_idle_time(Duration::ZERO);
        let leased = pool.checkout();
        drop(pool.checkout());

        pool.cleanup();

        assert!(leased.is_connected());
        assert_eq!(pool.stats().total, 1);
        assert_eq!(pool.stats().disconnected, 1);
    }

    #[test]
    fn test_cleanup_empty_pool() {
        let pool = TrackedPool::new("primary");
        pool.cleanup();
        assert_eq!(pool.stats().total, 0);
    }
}
