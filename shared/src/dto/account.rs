//! Marketplace account profile returned by `GET /account/profile`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::settings::TradingMode;

/// Backend-side view of the signed-in account
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountProfile {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Last trading mode the backend saw for this account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trading_mode: Option<TradingMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
