//! Data model shared by the catalog, settings, and credential pool
//!
//! Field names serialize in camelCase to match the persisted settings blob
//! and catalog rows (`created_at` is the one snake_case column).

use common::Secret;
use serde::{Deserialize, Serialize};

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Status of a generation credential.
///
/// The dispatcher only ever writes `Invalid`. Moving back to `Active` is an
/// admin action. `Exhausted` is accepted from stored records but never set
/// automatically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    #[default]
    Active,
    Invalid,
    Exhausted,
}

impl CredentialStatus {
    pub fn label(self) -> &'static str {
        match self {
            CredentialStatus::Active => "active",
            CredentialStatus::Invalid => "invalid",
            CredentialStatus::Exhausted => "exhausted",
        }
    }
}

/// One API key in the generation pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: String,
    #[serde(rename = "key")]
    pub secret: Secret<String>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub status: CredentialStatus,
    /// Unix millis
    #[serde(default)]
    pub added_at: u64,
}

impl Credential {
    pub fn is_active(&self) -> bool {
        self.status == CredentialStatus::Active
    }

    /// Label for logs, falling back to the masked secret.
    pub fn display_label(&self) -> String {
        if self.label.trim().is_empty() {
            self.secret.masked()
        } else {
            self.label.clone()
        }
    }
}

/// A style template in the catalog.
///
/// `position_index` controls display order. It may be missing, sparse, or
/// duplicated between reorders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleTemplate {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub prompt: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_index: Option<i64>,
    #[serde(default)]
    pub auto_apply: bool,
    /// Unix millis
    #[serde(rename = "created_at", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
}

/// Payment gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfig {
    pub gateway: String,
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub currency: String,
    pub enabled: bool,
    pub photo_price: f64,
}

impl PaymentConfig {
    /// Display symbol for the configured currency.
    pub fn currency_symbol(&self) -> &'static str {
        match self.currency.as_str() {
            "USD" => "$",
            "EUR" => "€",
            "GBP" => "£",
            _ => "₹",
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            gateway: "Razorpay".to_string(),
            key_id: String::new(),
            key_secret: Secret::default(),
            currency: "INR".to_string(),
            enabled: true,
            photo_price: 8.0,
        }
    }
}

/// Analytics tracking identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingConfig {
    pub enabled: bool,
    pub google_analytics_id: String,
    pub meta_pixel_id: String,
}

/// Discount code redeemable at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,
    pub discount_percent: u8,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// The global settings singleton.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub payment: PaymentConfig,
    pub tracking: TrackingConfig,
    pub coupons: Vec<Coupon>,
    /// The generation credential pool, in admin order.
    pub api_keys: Vec<Credential>,
    /// Fields this version does not know about, carried through writes.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Settings {
    /// Active coupon matching `code`, case-insensitively.
    pub fn coupon(&self, code: &str) -> Option<&Coupon> {
        self.coupons
            .iter()
            .find(|c| c.active && c.code.eq_ignore_ascii_case(code.trim()))
    }
}
