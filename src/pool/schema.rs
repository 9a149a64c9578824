// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Per-connection schema cache

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::registry::SchemaCache;

/// Table name to column names
pub type TableDefinitions = BTreeMap<String, Vec<String>>;

/// Cached table metadata, optionally bound to the connection that produced it
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    tables: Arc<TableDefinitions>,
    connection_id: Option<u64>,
}

impl SchemaSnapshot {
    pub fn new(tables: TableDefinitions, connection_id: u64) -> Self {
        Self {
            tables: Arc::new(tables),
            connection_id: Some(connection_id),
        }
    }

    pub(super) fn attach(mut self, connection_id: u64) -> Self {
        self.connection_id = Some(connection_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn tables(&self) -> &TableDefinitions {
        &self.tables
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    /// Connection the snapshot is bound to, `None` once detached
    pub fn connection_id(&self) -> Option<u64> {
        self.connection_id
    }

    /// Whether two snapshots share the same introspected tables
    pub fn same_tables(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tables, &other.tables)
    }
}

impl SchemaCache for SchemaSnapshot {
    fn detach_connection(&mut self) {
        self.connection_id = None;
    }

    fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
