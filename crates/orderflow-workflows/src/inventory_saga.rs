//! Inventory Saga: reserve stock for every line item of an order, wait for a
//! commit/cancel decision (or a timeout), and finalize or compensate.
//!
//! Reservations are compensated in the reverse of the order they were taken
//! in: unwinding last-reserved-first means a partially reserved product is
//! always released before the ones reserved ahead of it, which matches how
//! the rest of this engine undoes effects (most-recent decision first).

use std::collections::HashMap;
use std::sync::Mutex;
use std::task::Poll;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderflow_runtime::{poll_once, Effect, Workflow, WorkflowContext};
use orderflow_types::{ErrorKind, EventType, ExecutionError, InventoryStatus, JournalEntry, Payload};
use serde::{Deserialize, Serialize};

const COMMIT_WAIT: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InventoryUpdate {
    pub product_id: String,
    pub quantity: i64,
    pub order_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InventorySagaInput {
    pub order_id: String,
    pub updates: Vec<InventoryUpdate>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InventorySagaOutput {
    pub order_id: String,
    pub status: InventoryStatus,
    pub reason: Option<String>,
    pub reservations: HashMap<String, ReservationRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InventoryCheckResult {
    pub product_id: String,
    pub available: i64,
    pub is_available: bool,
    pub status: InventoryStatus,
    pub checked_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub product_id: String,
    pub quantity: i64,
    pub order_id: String,
    pub status: InventoryStatus,
    pub reserved_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdatedInventoryRecord {
    pub product_id: String,
    pub new_quantity: i64,
    pub status: InventoryStatus,
    pub updated_at: DateTime<Utc>,
}

enum Decision {
    Committed,
    Cancelled,
}

/// `inventory_check_*`-prefixed workflow ids run the check-only path: they
/// verify availability and never reserve, for callers that just want to
/// probe stock levels without taking a lock on it.
fn is_check_only(workflow_id: &str) -> bool {
    workflow_id.starts_with("inventory_check_")
}

/// Stateless by design, like the other two workflows: the in-memory backing
/// store lives behind the `check_inventory`/`reserve_inventory`/
/// `update_inventory`/`unreserve_inventory` effect bindings, not here.
pub struct InventorySagaWorkflow;

#[async_trait]
impl Workflow for InventorySagaWorkflow {
    type Input = InventorySagaInput;
    type Output = InventorySagaOutput;
    type State = Option<InventorySagaOutput>;

    async fn run(&self, ctx: &WorkflowContext, input: Self::Input) -> Result<Self::Output, ExecutionError> {
        let check_only = is_check_only(ctx.workflow_id().as_str());
        let mut reservations = HashMap::new();

        for update in &input.updates {
            let outcome = ctx
                .start_effect("check_inventory", Payload::from_json(update)?)
                .await;
            let result: InventoryCheckResult = match outcome {
                Ok(payload) => payload.to_json()?,
                Err(err) => {
                    return Ok(InventorySagaOutput {
                        order_id: input.order_id,
                        status: InventoryStatus::Failed,
                        reason: Some(err.message),
                        reservations,
                    });
                }
            };
            if !result.is_available {
                return Ok(InventorySagaOutput {
                    order_id: input.order_id,
                    status: InventoryStatus::Failed,
                    reason: Some(format!("insufficient stock for product {}", update.product_id)),
                    reservations,
                });
            }
        }

        if check_only {
            return Ok(InventorySagaOutput {
                order_id: input.order_id,
                status: InventoryStatus::Completed,
                reason: None,
                reservations,
            });
        }

        let mut reserved_order: Vec<&InventoryUpdate> = Vec::new();
        for update in &input.updates {
            match ctx
                .start_effect("reserve_inventory", Payload::from_json(update)?)
                .await
            {
                Ok(payload) => {
                    let record: ReservationRecord = payload.to_json()?;
                    reservations.insert(update.product_id.clone(), record);
                    reserved_order.push(update);
                }
                Err(err) => {
                    for already in reserved_order.iter().rev() {
                        let _ = ctx
                            .start_effect("unreserve_inventory", Payload::from_json(*already)?)
                            .await;
                    }
                    return Ok(InventorySagaOutput {
                        order_id: input.order_id,
                        status: InventoryStatus::Failed,
                        reason: Some(format!("failed to reserve {}: {}", update.product_id, err.message)),
                        reservations,
                    });
                }
            }
        }

        let mut deadline = ctx.start_timer(COMMIT_WAIT);
        let decision = ctx
            .wait_condition(|| {
                if ctx.signal_received("commit") {
                    return Some(Decision::Committed);
                }
                if ctx.signal_received("cancel") || ctx.cancel_requested() {
                    return Some(Decision::Cancelled);
                }
                match poll_once(&mut deadline) {
                    Poll::Ready(()) => Some(Decision::Cancelled),
                    Poll::Pending => None,
                }
            })
            .await;

        match decision {
            Decision::Committed => {
                for update in &input.updates {
                    match ctx
                        .start_effect("update_inventory", Payload::from_json(update)?)
                        .await
                    {
                        Ok(payload) => {
                            let record: UpdatedInventoryRecord = payload.to_json()?;
                            tracing::info!(
                                product_id = %record.product_id,
                                new_quantity = record.new_quantity,
                                "inventory updated after commit"
                            );
                        }
                        Err(err) => {
                            // Post-commit update failures are logged, not
                            // rolled back: the reservation already committed
                            // the order to fulfilling this stock, so undoing
                            // it here would double-decrement on a retry.
                            tracing::error!(
                                product_id = %update.product_id,
                                error = %err,
                                "inventory update failed after commit"
                            );
                        }
                    }
                }
                Ok(InventorySagaOutput {
                    order_id: input.order_id,
                    status: InventoryStatus::Completed,
                    reason: None,
                    reservations,
                })
            }
            Decision::Cancelled => {
                for update in input.updates.iter().rev() {
                    let _ = ctx
                        .start_effect("unreserve_inventory", Payload::from_json(update)?)
                        .await;
                }
                if ctx.cancel_requested() {
                    ctx.complete_as_cancelled();
                }
                Ok(InventorySagaOutput {
                    order_id: input.order_id,
                    status: InventoryStatus::Cancelled,
                    reason: Some("reservation window closed without a commit".to_string()),
                    reservations,
                })
            }
        }
    }

    fn fold_state(&self, state: &mut Self::State, entry: &JournalEntry) {
        match &entry.event {
            EventType::WorkflowCompleted { output } | EventType::WorkflowCancelled { output } => {
                *state = output.to_json::<InventorySagaOutput>().ok();
            }
            _ => {}
        }
    }

    fn handle_query(&self, state: &Self::State, query: &str, _args: Payload) -> Result<Payload, ExecutionError> {
        match query {
            "get_status" => Payload::from_json(&state.as_ref().map(|s| s.status)),
            "get_reservation_details" => Payload::from_json(&state.as_ref().map(|s| s.reservations.clone())),
            other => Err(ExecutionError::new(ErrorKind::NotFound, format!("unknown query {other}"))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct InventoryRecord {
    pub quantity: i64,
    pub reserved: i64,
}

/// In-memory backing store for the default effect implementations below.
/// Reservations are enforced with a per-product check-and-increment guarded
/// by this store's own mutex — the effect implementation owns the
/// concurrency discipline for whatever external state it talks to, not the
/// workflow or the engine.
#[derive(Default)]
pub struct InMemoryInventory {
    items: Mutex<HashMap<String, InventoryRecord>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, product_id: impl Into<String>, quantity: i64) {
        self.items.lock().unwrap().insert(
            product_id.into(),
            InventoryRecord { quantity, reserved: 0 },
        );
    }

    /// Current sellable quantity: on-hand minus whatever is reserved.
    pub fn available(&self, product_id: &str) -> i64 {
        self.items
            .lock()
            .unwrap()
            .get(product_id)
            .map(|r| r.quantity - r.reserved)
            .unwrap_or(0)
    }
}

pub struct CheckInventoryEffect {
    inventory: std::sync::Arc<InMemoryInventory>,
}

impl CheckInventoryEffect {
    pub fn new(inventory: std::sync::Arc<InMemoryInventory>) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl Effect for CheckInventoryEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        let update: InventoryUpdate = input.to_json()?;
        let known = self.inventory.items.lock().unwrap().contains_key(&update.product_id);
        if !known {
            return Err(ExecutionError::new(
                ErrorKind::NotFound,
                format!("unknown product {}", update.product_id),
            ));
        }
        let available = self.inventory.available(&update.product_id);
        Payload::from_json(&InventoryCheckResult {
            product_id: update.product_id,
            available,
            is_available: available >= update.quantity,
            status: if available >= update.quantity {
                InventoryStatus::InStock
            } else {
                InventoryStatus::OutOfStock
            },
            checked_at: Utc::now(),
        })
    }
}

pub struct ReserveInventoryEffect {
    inventory: std::sync::Arc<InMemoryInventory>,
}

impl ReserveInventoryEffect {
    pub fn new(inventory: std::sync::Arc<InMemoryInventory>) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl Effect for ReserveInventoryEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        let update: InventoryUpdate = input.to_json()?;
        let mut items = self.inventory.items.lock().unwrap();
        let record = items
            .get_mut(&update.product_id)
            .ok_or_else(|| ExecutionError::new(ErrorKind::NotFound, format!("unknown product {}", update.product_id)))?;
        if record.quantity - record.reserved < update.quantity {
            return Err(ExecutionError::new(
                ErrorKind::ValidationError,
                format!("insufficient stock for {}", update.product_id),
            ));
        }
        record.reserved += update.quantity;
        Payload::from_json(&ReservationRecord {
            product_id: update.product_id,
            quantity: update.quantity,
            order_id: update.order_id,
            status: InventoryStatus::Reserved,
            reserved_at: Utc::now(),
        })
    }
}

pub struct UnreserveInventoryEffect {
    inventory: std::sync::Arc<InMemoryInventory>,
}

impl UnreserveInventoryEffect {
    pub fn new(inventory: std::sync::Arc<InMemoryInventory>) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl Effect for UnreserveInventoryEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        let update: InventoryUpdate = input.to_json()?;
        if let Some(record) = self.inventory.items.lock().unwrap().get_mut(&update.product_id) {
            record.reserved = (record.reserved - update.quantity).max(0);
        }
        Payload::from_json(&true)
    }
}

pub struct UpdateInventoryEffect {
    inventory: std::sync::Arc<InMemoryInventory>,
}

impl UpdateInventoryEffect {
    pub fn new(inventory: std::sync::Arc<InMemoryInventory>) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl Effect for UpdateInventoryEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        let update: InventoryUpdate = input.to_json()?;
        let mut items = self.inventory.items.lock().unwrap();
        let record = items
            .get_mut(&update.product_id)
            .ok_or_else(|| ExecutionError::new(ErrorKind::NotFound, format!("unknown product {}", update.product_id)))?;
        record.quantity -= update.quantity;
        record.reserved = (record.reserved - update.quantity).max(0);
        Payload::from_json(&UpdatedInventoryRecord {
            product_id: update.product_id,
            new_quantity: record.quantity,
            status: InventoryStatus::Completed,
            updated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(product_id: &str, quantity: i64) -> InventoryUpdate {
        InventoryUpdate {
            product_id: product_id.to_string(),
            quantity,
            order_id: "order-1".to_string(),
        }
    }

    #[tokio::test]
    async fn reserve_then_check_reflects_reduced_availability() {
        let inventory = std::sync::Arc::new(InMemoryInventory::new());
        inventory.seed("sku-1", 10);

        let reserve = ReserveInventoryEffect::new(inventory.clone());
        reserve
            .call(Payload::from_json(&update("sku-1", 4)).unwrap())
            .await
            .unwrap();

        let check = CheckInventoryEffect::new(inventory.clone());
        let output = check
            .call(Payload::from_json(&update("sku-1", 7)).unwrap())
            .await
            .unwrap();
        let result: InventoryCheckResult = output.to_json().unwrap();
        assert_eq!(result.available, 6);
        assert!(!result.is_available);
    }

    #[tokio::test]
    async fn unreserve_gives_stock_back() {
        let inventory = std::sync::Arc::new(InMemoryInventory::new());
        inventory.seed("sku-1", 10);

        let reserve = ReserveInventoryEffect::new(inventory.clone());
        reserve
            .call(Payload::from_json(&update("sku-1", 4)).unwrap())
            .await
            .unwrap();

        let unreserve = UnreserveInventoryEffect::new(inventory.clone());
        unreserve
            .call(Payload::from_json(&update("sku-1", 4)).unwrap())
            .await
            .unwrap();

        assert_eq!(inventory.available("sku-1"), 10);
    }

    #[test]
    fn is_check_only_matches_the_reserved_workflow_id_prefix() {
        assert!(is_check_only("inventory_check_order-42"));
        assert!(!is_check_only("order-42"));
    }
}
