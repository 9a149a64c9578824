// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Multi-handler registry adapter

use std::sync::Arc;

use super::ConnectionRegistry;
use crate::error::{AppError, Result};

/// A set of named registries cleared together.
///
/// Hosts that split connections across several handlers (writing/reading
/// roles, sharded databases) need every handler told to clear. The first
/// handler is the primary one and serves [`ConnectionRegistry::current_connection`].
pub struct ConnectionHandlers<R> {
    handlers: Vec<(String, Arc<R>)>,
}

impl<R> ConnectionHandlers<R> {
    /// Builds the set; fails when `handlers` is empty or names repeat.
    pub fn new(handlers: Vec<(String, Arc<R>)>) -> Result<Self> {
        if handlers.is_empty() {
            return Err(AppError::Config(
                "At least one connection handler is required".to_string(),
            ));
        }

        for (index, (name, _)) in handlers.iter().enumerate() {
            if handlers[..index].iter().any(|(other, _)| other == name) {
                return Err(AppError::Config(format!(
                    "Duplicate connection handler '{name}'"
                )));
            }
        }

        Ok(Self { handlers })
    }

    /// Resolves a handler by name
    pub fn get(&self, name: &str) -> Option<Arc<R>> {
        self.handlers
            .iter()
            .find(|(handler, _)| handler == name)
            .map(|(_, registry)| registry.clone())
    }

    pub fn primary(&self) -> &Arc<R> {
        &self.handlers[0].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<R>)> {
        self.handlers
            .iter()
            .map(|(name, registry)| (name.as_str(), registry))
    }
}

impl<R: ConnectionRegistry> ConnectionRegistry for ConnectionHandlers<R> {
    type Connection = R::Connection;

    fn clear_all_connections(&self) {
        for (name, registry) in &self.handlers {
            tracing::trace!("Clearing all connections on handler '{}'", name);
            registry.clear_all_connections();
        }
    }

    fn clear_active_connections(&self) {
        for (name, registry) in &self.handlers {
            tracing::trace!("Clearing active connections on handler '{}'", name);
            registry.clear_active_connections();
        }
    }

    fn current_connection(&self) -> Self::Connection {
        self.primary().current_connection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConnectionHandle, SchemaCache};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct NoSchema;

    impl SchemaCache for NoSchema {
        fn detach_connection(&mut self) {}

        fn is_empty(&self) -> bool {
            true
        }
    }

    struct Handle(usize);

    impl ConnectionHandle for Handle {
        type SchemaCache = NoSchema;

        fn schema_cache(&self) -> NoSchema {
            NoSchema
        }

        fn set_schema_cache(&self, _cache: NoSchema) {}
    }

    #[derive(Default)]
    struct Counting {
        id: usize,
        all: AtomicUsize,
        active: AtomicUsize,
    }

    impl ConnectionRegistry for Counting {
        type Connection = Handle;

        fn clear_all_connections(&self) {
            self.all.fetch_add(1, Ordering::SeqCst);
        }

        fn clear_active_connections(&self) {
            self.active.fetch_add(1, Ordering::SeqCst);
        }

        fn current_connection(&self) -> Handle {
            Handle(self.id)
        }
    }

    fn handlers() -> (ConnectionHandlers<Counting>, Arc<Counting>, Arc<Counting>) {
        let writing = Arc::new(Counting {
            id: 1,
            ..Default::default()
        });
        let reading = Arc::new(Counting {
            id: 2,
            ..Default::default()
        });
        let set = ConnectionHandlers::new(vec![
            ("writing".to_string(), writing.clone()),
            ("reading".to_string(), reading.clone()),
        ])
        .unwrap();
        (set, writing, reading)
    }

    #[test]
    fn test_empty_handlers_rejected() {
        let result = ConnectionHandlers::<Counting>::new(vec![]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_duplicate_handlers_rejected() {
        let result = ConnectionHandlers::new(vec![
            ("primary".to_string(), Arc::new(Counting::default())),
            ("primary".to_string(), Arc::new(Counting::default())),
        ]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_clear_all_fans_out() {
        let (set, writing, reading) = handlers();
        set.clear_all_connections();

        assert_eq!(writing.all.load(Ordering::SeqCst), 1);
        assert_eq!(reading.all.load(Ordering::SeqCst), 1);
        assert_eq!(writing.active.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clear_active_fans_out() {
        let (set, writing, reading) = handlers();
        set.clear_active_connections();

        assert_eq!(writing.active.load(Ordering::SeqCst), 1);
        assert_eq!(reading.active.load(Ordering::SeqCst), 1);
        assert_eq!(reading.all.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_current_connection_uses_primary() {
        let (set, _, _) = handlers();
        assert_eq!(set.current_connection().0, 1);
    }

    #[test]
    fn test_get_by_name() {
        let (set, _, reading) = handlers();
        let found = set.get("reading").unwrap();
        assert!(Arc::ptr_eq(&found, &reading));
        assert!(set.get("missing").is_none());
        assert_eq!(
            set.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["writing", "reading"]
        );
    }
}
