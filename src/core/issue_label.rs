use crate::core::issuer::LabelIssuer;
use crate::domain::model::{IssueResult, ShippingMethod};
use crate::domain::ports::{
    ClickPostGateway, LabelRepository, OrderRepository, YamatoGateway,
};
use crate::utils::error::{IssueError, Result};

/// Duplicate issuance is allowed but flagged; the message matches what the
/// order pages show operators.
const DUPLICATE_WARNING: &str = "同一注文に既存の伝票があります（重複発行）";

#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub order_id: String,
    pub shipping_method: String,
}

/// The only caller of the dispatcher. Validates order state and input,
/// flags (without blocking) pre-existing labels, persists the result.
/// No retries here: a gateway failure propagates unchanged, and the caller
/// re-runs the whole use case if it wants another attempt.
pub struct IssueLabelUseCase<C, Y, OR, LR> {
    issuer: LabelIssuer<C, Y>,
    orders: OR,
    labels: LR,
}

impl<C, Y, OR, LR> IssueLabelUseCase<C, Y, OR, LR>
where
    C: ClickPostGateway,
    Y: YamatoGateway,
    OR: OrderRepository,
    LR: LabelRepository,
{
    pub fn new(issuer: LabelIssuer<C, Y>, orders: OR, labels: LR) -> Self {
        Self {
            issuer,
            orders,
            labels,
        }
    }

    pub async fn execute(&self, request: IssueRequest) -> Result<IssueResult> {
        let order = self
            .orders
            .find_by_id(&request.order_id)
            .await?
            .ok_or_else(|| IssueError::OrderNotFound {
                order_id: request.order_id.clone(),
            })?;

        if !order.is_pending() {
            return Err(IssueError::InvalidOperation {
                message: format!(
                    "order {} is not pending and cannot be issued a label",
                    order.id
                ),
            });
        }

        let method: ShippingMethod = request.shipping_method.parse()?;

        // Advisory only: a concurrent issuance can still slip past this read.
        // Re-issuance is a supported operation, so existing labels warn, not
        // block.
        let existing = self.labels.find_by_order_id(&order.id).await?;
        let mut warnings = Vec::new();
        if !existing.is_empty() {
            tracing::warn!(
                "Order {} already has {} label(s), issuing another",
                order.id,
                existing.len()
            );
            warnings.push(DUPLICATE_WARNING.to_string());
        }

        tracing::info!("Issuing {} label for order {}", method, order.id);
        let label = self.issuer.issue(&order, method).await?;

        self.labels.save(&label).await?;
        tracing::info!("Label {} persisted for order {}", label.label_id(), order.id);

        Ok(IssueResult::from_label(&label, warnings))
    }
}
