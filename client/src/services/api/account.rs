//! # Account Endpoints

use shared::AccountProfile;

use super::client::{ApiClient, RequestDescriptor};
use crate::core::error::ApiError;

/// Get the signed-in account's profile (`GET /account/profile`, requires a session).
pub async fn get_account_profile(client: &ApiClient) -> Result<AccountProfile, ApiError> {
    client
        .call_json(RequestDescriptor::get("/account/profile").authenticated())
        .await
}
