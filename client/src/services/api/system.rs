//! # System Endpoints
//!
//! Unauthenticated service probes.

use serde_json::Value;

use super::client::{ApiClient, RequestDescriptor};
use crate::core::error::ApiError;

/// Backend health probe (`GET /health`, public).
pub async fn get_health(client: &ApiClient) -> Result<Value, ApiError> {
    client.call(RequestDescriptor::get("/health")).await
}
