//! Order Approval workflow: validate an incoming order, route it to a human
//! approver, and carry out whichever decision (or cancellation) arrives.

use std::task::Poll;

use async_trait::async_trait;
use orderflow_runtime::{poll_once, Effect, Workflow, WorkflowContext};
use orderflow_types::{ErrorKind, EventType, ExecutionError, JournalEntry, OrderStatus, Payload};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderInput {
    pub order_id: String,
    pub customer_id: String,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: String,
    pub customer_id: String,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub reason: Option<String>,
}

impl OrderSnapshot {
    fn from_input(input: &OrderInput, status: OrderStatus) -> Self {
        Self {
            order_id: input.order_id.clone(),
            customer_id: input.customer_id.clone(),
            items: input.items.clone(),
            total_amount: input.total_amount,
            status,
            reason: None,
        }
    }

    fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// What `provide_decision`/`cancel_order` resolved the PENDING_APPROVAL wait
/// to. Only `Approved`/`Rejected` come from a recognized decision payload —
/// anything else is filtered out before it ever reaches this type, which is
/// this crate's resolution of the "unrecognized decision value" edge case:
/// the filtering loop in `run()` *is* the signal-validation step, so there is
/// no later branch in the workflow body that can observe a bad value.
enum Decision {
    Approved,
    Rejected,
    Cancelled,
}

/// Orders cannot be cancelled once they have left PENDING_APPROVAL — the
/// workflow simply stops checking `cancel_requested()`/`cancel` once it has
/// moved past that state, which is the control-flow equivalent of this list.
pub struct OrderApprovalWorkflow;

#[async_trait]
impl Workflow for OrderApprovalWorkflow {
    type Input = OrderInput;
    type Output = OrderSnapshot;
    type State = Option<OrderSnapshot>;

    async fn run(&self, ctx: &WorkflowContext, input: Self::Input) -> Result<Self::Output, ExecutionError> {
        let mut snapshot = OrderSnapshot::from_input(&input, OrderStatus::ValidationPending);

        match ctx
            .start_effect("validate_order", Payload::from_json(&snapshot)?)
            .await
        {
            Ok(_) => {}
            Err(err) if err.kind == ErrorKind::ValidationError => {
                snapshot.status = OrderStatus::ValidationFailed;
                return Ok(snapshot.with_reason(err.message));
            }
            Err(err) => {
                // Retries exhausted on a kind that isn't a business-rule
                // rejection: the order is auto-rejected rather than failing
                // the whole instance, so operators see a terminal business
                // state instead of an opaque WorkflowFailed.
                snapshot.status = OrderStatus::AutoRejected;
                return Ok(snapshot.with_reason(err.message));
            }
        }

        if ctx.cancel_requested() {
            ctx.start_effect("handle_cancellation", Payload::from_json(&snapshot.order_id)?)
                .await
                .ok();
            snapshot.status = OrderStatus::Cancelled;
            ctx.complete_as_cancelled();
            return Ok(snapshot);
        }

        snapshot.status = OrderStatus::PendingApproval;
        ctx.start_effect("notify_manager", Payload::from_json(&snapshot)?)
            .await?;

        let decision = ctx
            .wait_condition(|| {
                loop {
                    let mut fut = ctx.wait_signal("decision");
                    match poll_once(&mut fut) {
                        Poll::Pending => break,
                        Poll::Ready(payload) => {
                            let raw: String = match payload.to_json() {
                                Ok(raw) => raw,
                                Err(_) => continue,
                            };
                            match raw.trim().to_lowercase().as_str() {
                                "approved" => return Some(Decision::Approved),
                                "rejected" => return Some(Decision::Rejected),
                                _ => {
                                    tracing::warn!(decision = %raw, "ignoring unrecognized approval decision");
                                    continue;
                                }
                            }
                        }
                    }
                }
                if ctx.cancel_requested() {
                    Some(Decision::Cancelled)
                } else {
                    None
                }
            })
            .await;

        match decision {
            Decision::Approved => {
                snapshot.status = OrderStatus::Approved;
                ctx.start_effect("process_approved_order", Payload::from_json(&snapshot)?)
                    .await?;
                Ok(snapshot)
            }
            Decision::Rejected => {
                snapshot.status = OrderStatus::Rejected;
                ctx.start_effect("notify_rejection", Payload::from_json(&snapshot)?)
                    .await?;
                Ok(snapshot)
            }
            Decision::Cancelled => {
                ctx.start_effect("handle_cancellation", Payload::from_json(&snapshot.order_id)?)
                    .await
                    .ok();
                snapshot.status = OrderStatus::Cancelled;
                if ctx.cancel_requested() {
                    ctx.complete_as_cancelled();
                }
                Ok(snapshot)
            }
        }
    }

    fn fold_state(&self, state: &mut Self::State, entry: &JournalEntry) {
        match &entry.event {
            EventType::WorkflowCompleted { output } | EventType::WorkflowCancelled { output } => {
                *state = output.to_json::<OrderSnapshot>().ok();
            }
            _ => {}
        }
    }

    fn handle_query(&self, state: &Self::State, query: &str, _args: Payload) -> Result<Payload, ExecutionError> {
        match query {
            "get_status" => Payload::from_json(&state.as_ref().map(|s| s.status)),
            "get_details" => Payload::from_json(state),
            other => Err(ExecutionError::new(ErrorKind::NotFound, format!("unknown query {other}"))),
        }
    }
}

/// Reference validation effect: rejects a negative total as a business-rule
/// violation, accepts everything else. A real deployment replaces this with
/// whatever fraud/inventory/credit checks the order actually needs.
pub struct ValidateOrderEffect;

#[async_trait]
impl Effect for ValidateOrderEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        let snapshot: OrderSnapshot = input.to_json()?;
        if snapshot.total_amount < 0.0 {
            return Err(ExecutionError::new(
                ErrorKind::ValidationError,
                format!("order total must not be negative: {:.2}", snapshot.total_amount),
            ));
        }
        Payload::from_json(&true)
    }
}

pub struct NotifyManagerEffect;

#[async_trait]
impl Effect for NotifyManagerEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        let snapshot: OrderSnapshot = input.to_json()?;
        tracing::info!(order_id = %snapshot.order_id, "notified manager for approval");
        Payload::from_json(&true)
    }
}

pub struct ProcessApprovedOrderEffect;

#[async_trait]
impl Effect for ProcessApprovedOrderEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        let snapshot: OrderSnapshot = input.to_json()?;
        tracing::info!(order_id = %snapshot.order_id, "order approved and handed off for fulfillment");
        Payload::from_json(&true)
    }
}

pub struct NotifyRejectionEffect;

#[async_trait]
impl Effect for NotifyRejectionEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        let snapshot: OrderSnapshot = input.to_json()?;
        tracing::info!(order_id = %snapshot.order_id, "notified customer of rejection");
        Payload::from_json(&true)
    }
}

pub struct HandleCancellationEffect;

#[async_trait]
impl Effect for HandleCancellationEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        let order_id: String = input.to_json()?;
        tracing::info!(order_id = %order_id, "handled order cancellation cleanup");
        Payload::from_json(&true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> OrderInput {
        OrderInput {
            order_id: "order-1".to_string(),
            customer_id: "cust-1".to_string(),
            items: vec![OrderItem {
                product_id: "sku-1".to_string(),
                quantity: 2,
                unit_price: 9.99,
            }],
            total_amount: 19.98,
        }
    }

    #[tokio::test]
    async fn validate_order_rejects_negative_total() {
        let snapshot = OrderSnapshot::from_input(&order(), OrderStatus::ValidationPending);
        let mut bad = snapshot.clone();
        bad.total_amount = -5.0;

        let effect = ValidateOrderEffect;
        let err = effect.call(Payload::from_json(&bad).unwrap()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn validate_order_accepts_non_negative_total() {
        let snapshot = OrderSnapshot::from_input(&order(), OrderStatus::ValidationPending);
        let effect = ValidateOrderEffect;
        assert!(effect.call(Payload::from_json(&snapshot).unwrap()).await.is_ok());
    }
}
