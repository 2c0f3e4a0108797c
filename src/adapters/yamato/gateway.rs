use crate::adapters::browser::{BrowserFactory, BrowserPage};
use crate::adapters::yamato::page::YamatoCompactPage;
use crate::config::{AutomationConfig, CarrierCredentials};
use crate::domain::model::{Order, YamatoCompactLabel};
use crate::domain::ports::{Clock, LabelIdSource, YamatoGateway};
use crate::utils::error::{IssueError, Result};
use async_trait::async_trait;

const CARRIER: &str = "Yamato";

pub struct YamatoBrowserGateway<F, C, I> {
    factory: F,
    credentials: CarrierCredentials,
    automation: AutomationConfig,
    clock: C,
    ids: I,
}

impl<F, C, I> YamatoBrowserGateway<F, C, I>
where
    F: BrowserFactory,
    C: Clock,
    I: LabelIdSource,
{
    pub fn new(
        factory: F,
        credentials: CarrierCredentials,
        automation: AutomationConfig,
        clock: C,
        ids: I,
    ) -> Self {
        Self {
            factory,
            credentials,
            automation,
            clock,
            ids,
        }
    }

    async fn run(&self, page: &F::Page, order: &Order) -> Result<YamatoCompactLabel> {
        let protocol = YamatoCompactPage::new(page, &self.credentials, &self.automation);
        let issue = protocol.issue_label(order).await?;

        // Expiry is carrier policy (14 days), computed from the injected
        // clock, never from anything read off the page.
        Ok(YamatoCompactLabel::new(
            self.ids.next_label_id(),
            order.id.clone(),
            self.clock.now(),
            issue.qr_code,
            issue.waybill_number,
        ))
    }

    fn wrap(error: IssueError) -> IssueError {
        // Input errors (the unspaced-name check) are the caller's to handle
        // verbatim; only automation failures get the carrier prefix.
        if matches!(error, IssueError::InvalidInput { .. }) {
            return error;
        }
        IssueError::Carrier {
            carrier: CARRIER,
            message: "QR waybill issuance failed".to_string(),
            source: Box::new(error),
        }
    }
}

#[async_trait]
impl<F, C, I> YamatoGateway for YamatoBrowserGateway<F, C, I>
where
    F: BrowserFactory,
    C: Clock,
    I: LabelIdSource,
{
    async fn issue(&self, order: &Order) -> Result<YamatoCompactLabel> {
        let page = self.factory.launch().await.map_err(Self::wrap)?;

        let outcome = self.run(&page, order).await;

        if let Err(e) = page.close().await {
            tracing::warn!("{}: browser close failed: {}", CARRIER, e);
        }

        outcome.map_err(Self::wrap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::browser::scripted::{ScriptedFactory, ScriptedPage};
    use crate::adapters::yamato::page::test_support::success_page;
    use crate::adapters::yamato::page::{FALLBACK_WAYBILL, PLACEHOLDER_QR, QR_IMAGE, SENDER_LAST_NAME, WAYBILL_NUMBER};
    use crate::domain::model::{Buyer, OrderStatus, Product};
    use crate::utils::error::ErrorKind;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use std::time::Duration;

    struct FixedClock(DateTime<Utc>);
    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct FixedIds(&'static str);
    impl LabelIdSource for FixedIds {
        fn next_label_id(&self) -> String {
            self.0.to_string()
        }
    }

    fn fast_automation() -> AutomationConfig {
        AutomationConfig {
            per_locator_timeout: Duration::from_millis(50),
            stage_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(20),
            manual_login_timeout: Duration::from_millis(200),
            download_timeout: Duration::from_millis(50),
            dry_run: false,
            manual_login: false,
        }
    }

    fn order() -> Order {
        Order {
            id: "ORD-002".to_string(),
            buyer: Buyer {
                name: "山田 花子".to_string(),
                postal_code: "530-0001".to_string(),
                address_line1: "大阪府大阪市北区梅田1-1".to_string(),
                building: None,
            },
            product: Product {
                description: "衣類".to_string(),
            },
            status: OrderStatus::Pending,
        }
    }

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn gateway(page: ScriptedPage) -> YamatoBrowserGateway<ScriptedFactory, FixedClock, FixedIds> {
        YamatoBrowserGateway::new(
            ScriptedFactory::new(page),
            CarrierCredentials::new("member-001", "secret"),
            fast_automation(),
            FixedClock(issued_at()),
            FixedIds("LBL-YC-001"),
        )
    }

    #[tokio::test]
    async fn test_issue_builds_label_with_clock_derived_expiry() {
        let page = success_page();
        let label = gateway(page.clone()).issue(&order()).await.unwrap();

        assert_eq!(label.label_id, "LBL-YC-001");
        assert_eq!(label.order_id, "ORD-002");
        assert_eq!(label.issued_at, issued_at());
        assert_eq!(label.expires_at, issued_at() + ChronoDuration::days(14));
        assert_eq!(label.waybill_number, "5555-6666-7777");
    }

    #[tokio::test]
    async fn test_expiry_ignores_page_content() {
        // Even with the result page claiming some other validity, expiry
        // comes from the clock.
        let page = success_page();
        page.set_page_text("有効期限: 2099年12月31日");
        let label = gateway(page.clone()).issue(&order()).await.unwrap();
        assert_eq!(label.expires_at, issued_at() + ChronoDuration::days(14));
    }

    #[tokio::test]
    async fn test_placeholder_substitution_flows_into_label() {
        let page = success_page();
        page.remove_element(QR_IMAGE[0].value());
        page.remove_element(WAYBILL_NUMBER[0].value());
        page.set_page_text("アドレス帳に登録しました");

        let label = gateway(page.clone()).issue(&order()).await.unwrap();
        assert_eq!(label.qr_code, PLACEHOLDER_QR);
        assert_eq!(label.waybill_number, FALLBACK_WAYBILL);
    }

    #[tokio::test]
    async fn test_session_closed_exactly_once_on_success_and_failure() {
        let page = success_page();
        gateway(page.clone()).issue(&order()).await.unwrap();
        assert_eq!(page.close_count(), 1);

        let failing = success_page();
        failing.remove_element(SENDER_LAST_NAME[0].value());
        gateway(failing.clone()).issue(&order()).await.unwrap_err();
        assert_eq!(failing.close_count(), 1);
    }

    #[tokio::test]
    async fn test_automation_failure_wrapped_with_carrier_prefix() {
        let page = success_page();
        page.remove_element(SENDER_LAST_NAME[0].value());
        let err = gateway(page.clone()).issue(&order()).await.unwrap_err();

        assert!(err.to_string().starts_with("Yamato:"));
        assert_eq!(err.kind(), ErrorKind::External);
    }

    #[tokio::test]
    async fn test_unspaced_name_error_not_rebranded_as_carrier_failure() {
        let page = success_page();
        let mut bad_order = order();
        bad_order.buyer.name = "山田花子".to_string();

        let err = gateway(page.clone()).issue(&bad_order).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(page.close_count(), 1);
    }
}
