//! # Subscription Endpoints
//!
//! Plan tier, limits and usage for the signed-in user.

use async_trait::async_trait;
use shared::SubscriptionSnapshot;

use super::client::{ApiClient, RequestDescriptor};
use crate::core::error::ApiError;
use crate::core::service::BackendApi;

/// Get the subscription snapshot (`GET /subscription/status`, requires a session).
pub async fn get_subscription_status(client: &ApiClient) -> Result<SubscriptionSnapshot, ApiError> {
    client
        .call_json(RequestDescriptor::get("/subscription/status").authenticated())
        .await
}

#[async_trait]
impl BackendApi for ApiClient {
    async fn subscription_status(&self) -> Result<SubscriptionSnapshot, ApiError> {
        get_subscription_status(self).await
    }
}
