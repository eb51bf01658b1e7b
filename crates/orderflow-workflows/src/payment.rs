//! Payment workflow: charge a payment method, tolerate a flaky status check,
//! and honor a refund request for as long as the refund window stays open.

use std::task::Poll;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderflow_runtime::{poll_once, Effect, Workflow, WorkflowContext};
use orderflow_types::{ErrorKind, EventType, ExecutionError, JournalEntry, Payload, PaymentMethod, PaymentStatus};
use serde::{Deserialize, Serialize};

const REFUND_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentInput {
    pub payment_id: String,
    pub order_id: String,
    pub amount: f64,
    pub method: PaymentMethod,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    pub payment_id: String,
    pub order_id: String,
    pub amount: f64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl PaymentSnapshot {
    fn from_input(input: &PaymentInput, status: PaymentStatus) -> Self {
        Self {
            payment_id: input.payment_id.clone(),
            order_id: input.order_id.clone(),
            amount: input.amount,
            method: input.method,
            status,
            transaction_id: None,
            completed_at: None,
            reason: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct VerifyPaymentInput {
    payment_id: String,
    transaction_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct VerifyPaymentResult {
    status: PaymentStatus,
}

enum WaitOutcome {
    Refund,
    WindowClosed,
}

/// Payments cannot be refunded once the window closes, and a refund request
/// that arrives before the payment ever reaches COMPLETED is ignored: the
/// workflow only starts the refund wait after observing COMPLETED, so an
/// earlier `request_refund` delivery is simply never read by `wait_signal`
/// (its ordinal is still there for the query layer, but nothing in `run()`
/// ever asks for it again).
pub struct PaymentWorkflow;

#[async_trait]
impl Workflow for PaymentWorkflow {
    type Input = PaymentInput;
    type Output = PaymentSnapshot;
    type State = Option<PaymentSnapshot>;

    async fn run(&self, ctx: &WorkflowContext, input: Self::Input) -> Result<Self::Output, ExecutionError> {
        let mut snapshot = PaymentSnapshot::from_input(&input, PaymentStatus::Processing);

        match ctx
            .start_effect("process_payment", Payload::from_json(&snapshot)?)
            .await
        {
            Ok(payload) => {
                let result: PaymentSnapshot = payload.to_json()?;
                snapshot.status = result.status;
                snapshot.transaction_id = result.transaction_id;
            }
            Err(err) => {
                snapshot.status = PaymentStatus::Failed;
                snapshot.reason = Some(err.message);
                return Ok(snapshot);
            }
        }

        if snapshot.status == PaymentStatus::Processing && ctx.signal_received("cancel_payment") {
            snapshot.status = PaymentStatus::Failed;
            snapshot.reason = Some("cancelled before completion".to_string());
            if ctx.cancel_requested() {
                ctx.complete_as_cancelled();
            }
            return Ok(snapshot);
        }

        if snapshot.status == PaymentStatus::Processing {
            let verify_input = VerifyPaymentInput {
                payment_id: snapshot.payment_id.clone(),
                transaction_id: snapshot.transaction_id.clone(),
            };
            // A failed status check is swallowed rather than surfaced: the
            // payment stays PROCESSING and a later turn (triggered by a
            // signal, or an operator re-poking the instance) tries again
            // rather than the whole workflow failing on a flaky gateway
            // check.
            if let Ok(payload) = ctx
                .start_effect("verify_payment_status", Payload::from_json(&verify_input)?)
                .await
            {
                if let Ok(result) = payload.to_json::<VerifyPaymentResult>() {
                    snapshot.status = result.status;
                }
            }
        }

        if snapshot.status != PaymentStatus::Completed {
            return Ok(snapshot);
        }
        snapshot.completed_at = Some(ctx.now());

        let mut window = ctx.start_timer(REFUND_WINDOW);
        let outcome = ctx
            .wait_condition(|| {
                if ctx.signal_received("request_refund") {
                    return Some(WaitOutcome::Refund);
                }
                match poll_once(&mut window) {
                    Poll::Ready(()) => Some(WaitOutcome::WindowClosed),
                    Poll::Pending => None,
                }
            })
            .await;

        match outcome {
            WaitOutcome::Refund => match ctx.start_effect("refund_payment", Payload::from_json(&snapshot)?).await {
                Ok(payload) => {
                    let result: PaymentSnapshot = payload.to_json()?;
                    snapshot.status = result.status;
                }
                Err(err) => {
                    snapshot.reason = Some(err.message);
                }
            },
            WaitOutcome::WindowClosed => {}
        }

        Ok(snapshot)
    }

    fn fold_state(&self, state: &mut Self::State, entry: &JournalEntry) {
        match &entry.event {
            EventType::WorkflowCompleted { output } | EventType::WorkflowCancelled { output } => {
                *state = output.to_json::<PaymentSnapshot>().ok();
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

/// Reference charge effect: rejects a non-positive amount outright, and
/// otherwise completes immediately with a deterministic transaction id. A
/// real gateway integration replaces this with whatever settlement call the
/// payment actually needs, including genuinely landing in PROCESSING.
pub struct ProcessPaymentEffect;

#[async_trait]
impl Effect for ProcessPaymentEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        let snapshot: PaymentSnapshot = input.to_json()?;
        if snapshot.amount <= 0.0 {
            return Err(ExecutionError::new(
                ErrorKind::ValidationError,
                format!("payment amount must be positive: {:.2}", snapshot.amount),
            ));
        }
        let mut result = snapshot;
        result.status = PaymentStatus::Completed;
        result.transaction_id = Some(format!("txn-{}", result.payment_id));
        Payload::from_json(&result)
    }
}

pub struct VerifyPaymentStatusEffect;

#[async_trait]
impl Effect for VerifyPaymentStatusEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        let verify: VerifyPaymentInput = input.to_json()?;
        tracing::info!(payment_id = %verify.payment_id, "verified payment status with gateway");
        Payload::from_json(&VerifyPaymentResult {
            status: PaymentStatus::Completed,
        })
    }
}

pub struct RefundPaymentEffect;

#[async_trait]
impl Effect for RefundPaymentEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        let snapshot: PaymentSnapshot = input.to_json()?;
        if snapshot.status != PaymentStatus::Completed {
            return Err(ExecutionError::new(
                ErrorKind::IllegalState,
                format!("cannot refund a payment in status {:?}", snapshot.status),
            ));
        }
        let mut result = snapshot;
        result.status = PaymentStatus::Refunded;
        Payload::from_json(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(status: PaymentStatus) -> PaymentSnapshot {
        PaymentSnapshot {
            payment_id: "pay-1".to_string(),
            order_id: "order-1".to_string(),
            amount: 42.0,
            method: PaymentMethod::CreditCard,
            status,
            transaction_id: Some("txn-pay-1".to_string()),
            completed_at: None,
            reason: None,
        }
    }

    #[tokio::test]
    async fn process_payment_rejects_non_positive_amount() {
        let mut bad = snapshot(PaymentStatus::Processing);
        bad.amount = 0.0;
        let err = ProcessPaymentEffect
            .call(Payload::from_json(&bad).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn refund_payment_rejects_when_not_completed() {
        let pending = snapshot(PaymentStatus::Processing);
        let err = RefundPaymentEffect
            .call(Payload::from_json(&pending).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::IllegalState);
    }

    #[tokio::test]
    async fn refund_payment_succeeds_when_completed() {
        let completed = snapshot(PaymentStatus::Completed);
        let output = RefundPaymentEffect
            .call(Payload::from_json(&completed).unwrap())
            .await
            .unwrap();
        let result: PaymentSnapshot = output.to_json().unwrap();
        assert_eq!(result.status, PaymentStatus::Refunded);
    }
}
