use crate::domain::model::{Order, ShippingLabel, ShippingMethod};
use crate::domain::ports::{ClickPostGateway, YamatoGateway};
use crate::utils::error::Result;

/// Pure routing over the closed method set. The `match` below is the single
/// place that must stay exhaustive: a new `ShippingMethod` variant fails to
/// compile until it is wired to a gateway here.
pub struct LabelIssuer<C, Y> {
    clickpost: C,
    yamato: Y,
}

impl<C, Y> LabelIssuer<C, Y>
where
    C: ClickPostGateway,
    Y: YamatoGateway,
{
    pub fn new(clickpost: C, yamato: Y) -> Self {
        Self { clickpost, yamato }
    }

    pub async fn issue(&self, order: &Order, method: ShippingMethod) -> Result<ShippingLabel> {
        match method {
            ShippingMethod::ClickPost => {
                let label = self.clickpost.issue(order).await?;
                Ok(ShippingLabel::ClickPost(label))
            }
            ShippingMethod::YamatoCompact => {
                let label = self.yamato.issue(order).await?;
                Ok(ShippingLabel::YamatoCompact(label))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        Buyer, ClickPostLabel, OrderStatus, Product, YamatoCompactLabel,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingClickPost(Arc<AtomicUsize>);

    #[async_trait]
    impl ClickPostGateway for CountingClickPost {
        async fn issue(&self, order: &Order) -> Result<ClickPostLabel> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ClickPostLabel {
                label_id: "LBL-CP".to_string(),
                order_id: order.id.clone(),
                issued_at: Utc::now(),
                pdf_data: vec![1],
                tracking_number: "1234-5678-9012".to_string(),
            })
        }
    }

    struct CountingYamato(Arc<AtomicUsize>);

    #[async_trait]
    impl YamatoGateway for CountingYamato {
        async fn issue(&self, order: &Order) -> Result<YamatoCompactLabel> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(YamatoCompactLabel::new(
                "LBL-YC".to_string(),
                order.id.clone(),
                Utc::now(),
                "qr".to_string(),
                "1111-2222-3333".to_string(),
            ))
        }
    }

    fn order() -> Order {
        Order {
            id: "ORD-001".to_string(),
            buyer: Buyer {
                name: "山田 太郎".to_string(),
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

    #[tokio::test]
    async fn test_routes_click_post_to_clickpost_gateway() {
        let cp_calls = Arc::new(AtomicUsize::new(0));
        let yc_calls = Arc::new(AtomicUsize::new(0));
        let issuer = LabelIssuer::new(
            CountingClickPost(cp_calls.clone()),
            CountingYamato(yc_calls.clone()),
        );

        let label = issuer
            .issue(&order(), ShippingMethod::ClickPost)
            .await
            .unwrap();

        assert!(matches!(label, ShippingLabel::ClickPost(_)));
        assert_eq!(cp_calls.load(Ordering::SeqCst), 1);
        assert_eq!(yc_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_routes_yamato_compact_to_yamato_gateway() {
        let cp_calls = Arc::new(AtomicUsize::new(0));
        let yc_calls = Arc::new(AtomicUsize::new(0));
        let issuer = LabelIssuer::new(
            CountingClickPost(cp_calls.clone()),
            CountingYamato(yc_calls.clone()),
        );

        let label = issuer
            .issue(&order(), ShippingMethod::YamatoCompact)
            .await
            .unwrap();

        assert!(matches!(label, ShippingLabel::YamatoCompact(_)));
        assert_eq!(cp_calls.load(Ordering::SeqCst), 0);
        assert_eq!(yc_calls.load(Ordering::SeqCst), 1);
    }
}
