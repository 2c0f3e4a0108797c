//! In-memory key-value row stores behind the repository ports. Orders are
//! seeded at startup (or by tests); labels are append-only, matching the
//! create-once lifecycle of the domain.

use crate::domain::model::{Order, ShippingLabel};
use crate::domain::ports::{LabelRepository, OrderRepository};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct MemoryOrderStore {
    rows: Arc<Mutex<HashMap<String, Order>>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, order: Order) {
        let mut rows = self.rows.lock().await;
        rows.insert(order.id.clone(), order);
    }

    pub async fn seed(&self, orders: Vec<Order>) {
        let mut rows = self.rows.lock().await;
        for order in orders {
            rows.insert(order.id.clone(), order);
        }
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderStore {
    async fn find_by_id(&self, order_id: &str) -> Result<Option<Order>> {
        let rows = self.rows.lock().await;
        Ok(rows.get(order_id).cloned())
    }
}

#[derive(Clone, Default)]
pub struct MemoryLabelStore {
    rows: Arc<Mutex<HashMap<String, ShippingLabel>>>,
}

impl MemoryLabelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait]
impl LabelRepository for MemoryLabelStore {
    async fn find_by_order_id(&self, order_id: &str) -> Result<Vec<ShippingLabel>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .values()
            .filter(|label| label.order_id() == order_id)
            .cloned()
            .collect())
    }

    async fn save(&self, label: &ShippingLabel) -> Result<()> {
        let mut rows = self.rows.lock().await;
        rows.insert(label.label_id().to_string(), label.clone());
        Ok(())
    }

    async fn find_by_id(&self, label_id: &str) -> Result<Option<ShippingLabel>> {
        let rows = self.rows.lock().await;
        Ok(rows.get(label_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Buyer, ClickPostLabel, OrderStatus, Product};
    use chrono::Utc;

    fn order(id: &str) -> Order {
        Order {
            id: id.to_string(),
            buyer: Buyer {
                name: "山田太郎".to_string(),
                postal_code: "100-0001".to_string(),
                address_line1: "東京都千代田区1-1".to_string(),
                building: None,
            },
            product: Product {
                description: "書籍".to_string(),
            },
            status: OrderStatus::Pending,
        }
    }

    fn label(label_id: &str, order_id: &str) -> ShippingLabel {
        ShippingLabel::ClickPost(ClickPostLabel {
            label_id: label_id.to_string(),
            order_id: order_id.to_string(),
            issued_at: Utc::now(),
            pdf_data: vec![1],
            tracking_number: "1234-5678-9012".to_string(),
        })
    }

    #[tokio::test]
    async fn test_order_store_find() {
        let store = MemoryOrderStore::new();
        store.insert(order("ORD-001")).await;

        assert!(store.find_by_id("ORD-001").await.unwrap().is_some());
        assert!(store.find_by_id("ORD-404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_label_store_accumulates_per_order() {
        let store = MemoryLabelStore::new();
        store.save(&label("LBL-1", "ORD-001")).await.unwrap();
        store.save(&label("LBL-2", "ORD-001")).await.unwrap();
        store.save(&label("LBL-3", "ORD-002")).await.unwrap();

        assert_eq!(store.find_by_order_id("ORD-001").await.unwrap().len(), 2);
        assert_eq!(store.find_by_order_id("ORD-002").await.unwrap().len(), 1);
        assert!(store.find_by_id("LBL-2").await.unwrap().is_some());
        assert_eq!(store.count().await, 3);
    }
}
