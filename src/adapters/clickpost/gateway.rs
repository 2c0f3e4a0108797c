use crate::adapters::browser::{BrowserFactory, BrowserPage};
use crate::adapters::clickpost::page::ClickPostPage;
use crate::config::{AutomationConfig, CarrierCredentials};
use crate::domain::model::{ClickPostLabel, Order};
use crate::domain::ports::{ClickPostGateway, Clock, LabelIdSource};
use crate::utils::error::{IssueError, Result};
use async_trait::async_trait;

const CARRIER: &str = "ClickPost";

/// Owns one browser session per issuance: launch, run the page protocol, map
/// the scraped fields into a label, close the session on every exit path.
pub struct ClickPostBrowserGateway<F, C, I> {
    factory: F,
    credentials: CarrierCredentials,
    automation: AutomationConfig,
    clock: C,
    ids: I,
}

impl<F, C, I> ClickPostBrowserGateway<F, C, I>
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

    async fn run(&self, page: &F::Page, order: &Order) -> Result<ClickPostLabel> {
        let protocol = ClickPostPage::new(page, &self.credentials, &self.automation);
        let issue = protocol.issue_label(order).await?;

        Ok(ClickPostLabel {
            label_id: self.ids.next_label_id(),
            order_id: order.id.clone(),
            issued_at: self.clock.now(),
            pdf_data: issue.pdf_data,
            tracking_number: issue.tracking_number,
        })
    }

    fn wrap(error: IssueError) -> IssueError {
        IssueError::Carrier {
            carrier: CARRIER,
            message: "label issuance failed".to_string(),
            source: Box::new(error),
        }
    }
}

#[async_trait]
impl<F, C, I> ClickPostGateway for ClickPostBrowserGateway<F, C, I>
where
    F: BrowserFactory,
    C: Clock,
    I: LabelIdSource,
{
    async fn issue(&self, order: &Order) -> Result<ClickPostLabel> {
        let page = self.factory.launch().await.map_err(Self::wrap)?;

        let outcome = self.run(&page, order).await;

        // Cleanup runs on every path. A failing close is logged and never
        // replaces the issuance outcome.
        if let Err(e) = page.close().await {
            tracing::warn!("{}: browser close failed: {}", CARRIER, e);
        }

        outcome.map_err(Self::wrap)
    }
}
