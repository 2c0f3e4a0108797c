use crate::utils::error::IssueError;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Carrier-mandated validity window for Yamato compact QR waybills.
pub const YAMATO_VALIDITY_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Shipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buyer {
    pub name: String,
    pub postal_code: String,
    pub address_line1: String,
    /// Building / room name. Only written to the second address line when present.
    #[serde(default)]
    pub building: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Package content description shown on the carrier form (内容品).
    pub description: String,
}

/// Read-only input to issuance. Orders are owned by the order discovery side;
/// this core never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub buyer: Buyer,
    pub product: Product,
    pub status: OrderStatus,
}

impl Order {
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}

/// The closed set of supported carrier methods. Adding a carrier here makes
/// every non-exhaustive match a compile error, which is the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    ClickPost,
    YamatoCompact,
}

impl ShippingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingMethod::ClickPost => "click_post",
            ShippingMethod::YamatoCompact => "yamato_compact",
        }
    }
}

impl std::fmt::Display for ShippingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShippingMethod {
    type Err = IssueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "click_post" => Ok(ShippingMethod::ClickPost),
            "yamato_compact" => Ok(ShippingMethod::YamatoCompact),
            other => Err(IssueError::InvalidInput {
                message: format!("Unsupported shipping method: {}", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStatus {
    Issued,
}

/// Printable PDF label issued through the ClickPost portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickPostLabel {
    pub label_id: String,
    pub order_id: String,
    pub issued_at: DateTime<Utc>,
    pub pdf_data: Vec<u8>,
    pub tracking_number: String,
}

/// QR waybill for a Yamato compact parcel. The QR is presented at a drop-off
/// terminal; it expires 14 days after issuance regardless of what the portal
/// page claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YamatoCompactLabel {
    pub label_id: String,
    pub order_id: String,
    pub issued_at: DateTime<Utc>,
    pub qr_code: String,
    pub waybill_number: String,
    pub expires_at: DateTime<Utc>,
}

impl YamatoCompactLabel {
    pub fn new(
        label_id: String,
        order_id: String,
        issued_at: DateTime<Utc>,
        qr_code: String,
        waybill_number: String,
    ) -> Self {
        let expires_at = issued_at + Duration::days(YAMATO_VALIDITY_DAYS);
        Self {
            label_id,
            order_id,
            issued_at,
            qr_code,
            waybill_number,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// An issued label. Labels are written once and never updated or deleted;
/// several labels may reference the same order (re-issuance is allowed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShippingLabel {
    ClickPost(ClickPostLabel),
    YamatoCompact(YamatoCompactLabel),
}

impl ShippingLabel {
    pub fn label_id(&self) -> &str {
        match self {
            ShippingLabel::ClickPost(l) => &l.label_id,
            ShippingLabel::YamatoCompact(l) => &l.label_id,
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            ShippingLabel::ClickPost(l) => &l.order_id,
            ShippingLabel::YamatoCompact(l) => &l.order_id,
        }
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        match self {
            ShippingLabel::ClickPost(l) => l.issued_at,
            ShippingLabel::YamatoCompact(l) => l.issued_at,
        }
    }

    pub fn method(&self) -> ShippingMethod {
        match self {
            ShippingLabel::ClickPost(_) => ShippingMethod::ClickPost,
            ShippingLabel::YamatoCompact(_) => ShippingMethod::YamatoCompact,
        }
    }

    pub fn status(&self) -> LabelStatus {
        LabelStatus::Issued
    }
}

/// Flat, transport-agnostic result of one issuance. Carrier-specific fields
/// are present only for the matching label type.
#[derive(Debug, Clone, Serialize)]
pub struct IssueResult {
    pub order_id: String,
    pub label_id: String,
    pub shipping_method: ShippingMethod,
    pub label_type: ShippingMethod,
    pub status: LabelStatus,
    pub issued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Base64-encoded PDF document (ClickPost only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waybill_number: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl IssueResult {
    pub fn from_label(label: &ShippingLabel, warnings: Vec<String>) -> Self {
        let base = Self {
            order_id: label.order_id().to_string(),
            label_id: label.label_id().to_string(),
            shipping_method: label.method(),
            label_type: label.method(),
            status: label.status(),
            issued_at: label.issued_at(),
            expires_at: None,
            pdf_data: None,
            tracking_number: None,
            qr_code: None,
            waybill_number: None,
            warnings,
        };

        match label {
            ShippingLabel::ClickPost(l) => Self {
                pdf_data: Some(base64::engine::general_purpose::STANDARD.encode(&l.pdf_data)),
                tracking_number: Some(l.tracking_number.clone()),
                ..base
            },
            ShippingLabel::YamatoCompact(l) => Self {
                expires_at: Some(l.expires_at),
                qr_code: Some(l.qr_code.clone()),
                waybill_number: Some(l.waybill_number.clone()),
                ..base
            },
        }
    }
}
