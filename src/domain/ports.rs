use crate::domain::model::{ClickPostLabel, Order, ShippingLabel, YamatoCompactLabel};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>>;
}

#[async_trait]
pub trait LabelRepository: Send + Sync {
    async fn find_by_order_id(&self, order_id: &str) -> Result<Vec<ShippingLabel>>;
    async fn save(&self, label: &ShippingLabel) -> Result<()>;
    async fn find_by_id(&self, label_id: &str) -> Result<Option<ShippingLabel>>;
}

/// Injected time source so tests can pin `issued_at`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Label id generation, substitutable for deterministic tests.
pub trait LabelIdSource: Send + Sync {
    fn next_label_id(&self) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct UuidLabelIds;

impl LabelIdSource for UuidLabelIds {
    fn next_label_id(&self) -> String {
        format!("LBL-{}", uuid::Uuid::new_v4())
    }
}

#[async_trait]
pub trait ClickPostGateway: Send + Sync {
    async fn issue(&self, order: &Order) -> Result<ClickPostLabel>;
}

#[async_trait]
pub trait YamatoGateway: Send + Sync {
    async fn issue(&self, order: &Order) -> Result<YamatoCompactLabel>;
}
