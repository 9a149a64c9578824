// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Connection registry collaborators
//!
//! The refresher never owns connections. It talks to whatever pool the host
//! application uses through these traits:
//!
//! - [`ConnectionRegistry`]: clears pooled connections and hands out the live one
//! - [`ConnectionHandle`]: a leased connection carrying a schema cache
//! - [`SchemaCache`]: the cached table metadata that survives a recycle
//!
//! [`ConnectionHandlers`] adapts hosts that keep several named registries.

mod handlers;

pub use handlers::ConnectionHandlers;

/// A pool of database connections that can be cleared on demand.
///
/// Calls are synchronous and infallible by contract: an implementation that
/// can fail logs the failure itself.
pub trait ConnectionRegistry: Send + Sync + 'static {
    /// Connection type returned by [`current_connection`](Self::current_connection)
    type Connection: ConnectionHandle;

    /// Disconnects every pooled connection, idle or leased.
    fn clear_all_connections(&self);

    /// Returns connections held by finished requests to the pool without
    /// disconnecting them. Connections leased by in-flight requests stay
    /// leased.
    fn clear_active_connections(&self);

    /// Returns the live connection, opening one if the pool is empty.
    fn current_connection(&self) -> Self::Connection;
}

/// A leased connection.
pub trait ConnectionHandle {
    type SchemaCache: SchemaCache;

    fn schema_cache(&self) -> Self::SchemaCache;

    fn set_schema_cache(&self, cache: Self::SchemaCache);
}

/// Schema metadata cached per connection.
pub trait SchemaCache: Clone + Send + Sync + 'static {
    /// Drops the back-reference to the owning connection so the snapshot can
    /// be installed on a different one.
    fn detach_connection(&mut self);

    /// Whether nothing has been introspected into this cache yet
    fn is_empty(&self) -> bool;
}

/// Schema cache type reachable through a registry's connections
pub type SchemaCacheOf<R> =
    <<R as ConnectionRegistry>::Connection as ConnectionHandle>::SchemaCache;
