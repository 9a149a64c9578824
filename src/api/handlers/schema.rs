// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::AppState;

/// Schema endpoint response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct SchemaResponse {
    pub handler: String,
    pub connection_id: u64,
    pub tables: BTreeMap<String, Vec<String>>,
    pub introspections: u64,
}

/// GET /schema
///
/// Leases a connection from the schema cache target and returns its cached
/// schema. The cache survives recycles, so introspection only happens when a
/// connection has none.
pub async fn schema_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let target = &state.schema_cache_target;
    let connection = target.checkout();
    let schema = connection.schema();

    let response = SchemaResponse {
        handler: target.name().to_string(),
        connection_id: connection.id(),
        tables: schema.tables().clone(),
        introspections: target.stats().introspections,
    };

    (StatusCode::OK, Json(response))
}
