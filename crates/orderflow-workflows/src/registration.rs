//! Wires the three domain workflows and their default effect bindings into
//! an [`Engine`]. Centralizing this here keeps workflow-type names and
//! effect-name strings in one place instead of duplicated across every
//! binary/test that starts an engine.

use std::sync::Arc;
use std::time::Duration;

use orderflow_runtime::{
    Adapter, DurableLog, Effect, EffectRegistry, Engine, EngineConfig, WorkflowErased, WorkflowRegistry,
};
use orderflow_types::{EffectSpec, ErrorKind, RetryPolicy};

use crate::inventory_saga::{
    CheckInventoryEffect, InMemoryInventory, InventorySagaWorkflow, ReserveInventoryEffect, UnreserveInventoryEffect,
    UpdateInventoryEffect,
};
use crate::order_approval::{
    HandleCancellationEffect, NotifyManagerEffect, NotifyRejectionEffect, OrderApprovalWorkflow,
    ProcessApprovedOrderEffect, ValidateOrderEffect,
};
use crate::payment::{PaymentWorkflow, ProcessPaymentEffect, RefundPaymentEffect, VerifyPaymentStatusEffect};

pub const ORDER_APPROVAL_WORKFLOW: &str = "order_approval";
pub const PAYMENT_WORKFLOW: &str = "payment";
pub const INVENTORY_SAGA_WORKFLOW: &str = "inventory_saga";

const ORDER_TASK_QUEUE: &str = "order-task-queue";
const PAYMENT_TASK_QUEUE: &str = "payment-task-queue";
const INVENTORY_TASK_QUEUE: &str = "inventory-task-queue";

/// Builds an [`Engine`] with all three domain workflows and their reference
/// effect implementations registered, backed by `inventory` for the saga's
/// stock-keeping effects. Callers that need a different log implementation
/// or a production effect binding should copy this and swap the piece they
/// need rather than thread every dependency through here as a parameter.
pub fn build_engine(log: Arc<dyn DurableLog>, inventory: Arc<InMemoryInventory>, config: EngineConfig) -> Engine {
    let mut workflows = WorkflowRegistry::new();
    workflows.register(
        ORDER_APPROVAL_WORKFLOW,
        Arc::new(Adapter::new(OrderApprovalWorkflow)) as Arc<dyn WorkflowErased>,
    );
    workflows.register(
        PAYMENT_WORKFLOW,
        Arc::new(Adapter::new(PaymentWorkflow)) as Arc<dyn WorkflowErased>,
    );
    workflows.register(
        INVENTORY_SAGA_WORKFLOW,
        Arc::new(Adapter::new(InventorySagaWorkflow)) as Arc<dyn WorkflowErased>,
    );

    let mut effects = EffectRegistry::new();
    effects.register(ORDER_TASK_QUEUE, "validate_order", Arc::new(ValidateOrderEffect) as Arc<dyn Effect>);
    effects.register(ORDER_TASK_QUEUE, "notify_manager", Arc::new(NotifyManagerEffect) as Arc<dyn Effect>);
    effects.register(
        ORDER_TASK_QUEUE,
        "process_approved_order",
        Arc::new(ProcessApprovedOrderEffect) as Arc<dyn Effect>,
    );
    effects.register(ORDER_TASK_QUEUE, "notify_rejection", Arc::new(NotifyRejectionEffect) as Arc<dyn Effect>);
    effects.register(
        ORDER_TASK_QUEUE,
        "handle_cancellation",
        Arc::new(HandleCancellationEffect) as Arc<dyn Effect>,
    );

    effects.register(PAYMENT_TASK_QUEUE, "process_payment", Arc::new(ProcessPaymentEffect) as Arc<dyn Effect>);
    effects.register(
        PAYMENT_TASK_QUEUE,
        "verify_payment_status",
        Arc::new(VerifyPaymentStatusEffect) as Arc<dyn Effect>,
    );
    effects.register(PAYMENT_TASK_QUEUE, "refund_payment", Arc::new(RefundPaymentEffect) as Arc<dyn Effect>);

    effects.register(
        INVENTORY_TASK_QUEUE,
        "check_inventory",
        Arc::new(CheckInventoryEffect::new(inventory.clone())) as Arc<dyn Effect>,
    );
    effects.register(
        INVENTORY_TASK_QUEUE,
        "reserve_inventory",
        Arc::new(ReserveInventoryEffect::new(inventory.clone())) as Arc<dyn Effect>,
    );
    effects.register(
        INVENTORY_TASK_QUEUE,
        "unreserve_inventory",
        Arc::new(UnreserveInventoryEffect::new(inventory.clone())) as Arc<dyn Effect>,
    );
    effects.register(
        INVENTORY_TASK_QUEUE,
        "update_inventory",
        Arc::new(UpdateInventoryEffect::new(inventory)) as Arc<dyn Effect>,
    );

    Engine::new(log, workflows, effects, effect_specs(), config)
}

/// Retry contracts for every registered effect (§4.4). `ValidationError` and
/// `IllegalState` are business-rule rejections, never worth retrying; every
/// other default kind gets the standard exponential backoff.
pub fn effect_specs() -> Vec<EffectSpec> {
    let order_retry = || {
        RetryPolicy::new(Duration::from_secs(2), 2.0, Duration::from_secs(30), 3)
            .non_retryable(vec![ErrorKind::ValidationError])
    };
    let payment_retry = || {
        RetryPolicy::new(Duration::from_secs(1), 2.0, Duration::from_secs(10), 3)
            .non_retryable(vec![ErrorKind::ValidationError, ErrorKind::IllegalState])
    };
    let inventory_retry = || {
        RetryPolicy::new(Duration::from_secs(1), 2.0, Duration::from_secs(20), 4)
            .non_retryable(vec![ErrorKind::ValidationError, ErrorKind::NotFound])
    };

    vec![
        EffectSpec::new("validate_order", ORDER_TASK_QUEUE, order_retry(), Duration::from_secs(10)),
        EffectSpec::new("notify_manager", ORDER_TASK_QUEUE, order_retry(), Duration::from_secs(10)),
        EffectSpec::new(
            "process_approved_order",
            ORDER_TASK_QUEUE,
            order_retry(),
            Duration::from_secs(10),
        ),
        EffectSpec::new("notify_rejection", ORDER_TASK_QUEUE, order_retry(), Duration::from_secs(10)),
        EffectSpec::new(
            "handle_cancellation",
            ORDER_TASK_QUEUE,
            order_retry(),
            Duration::from_secs(10),
        ),
        EffectSpec::new(
            "process_payment",
            PAYMENT_TASK_QUEUE,
            payment_retry(),
            Duration::from_secs(15),
        ),
        EffectSpec::new(
            "verify_payment_status",
            PAYMENT_TASK_QUEUE,
            payment_retry(),
            Duration::from_secs(15),
        ),
        EffectSpec::new(
            "refund_payment",
            PAYMENT_TASK_QUEUE,
            payment_retry(),
            Duration::from_secs(15),
        ),
        EffectSpec::new(
            "check_inventory",
            INVENTORY_TASK_QUEUE,
            inventory_retry(),
            Duration::from_secs(5),
        ),
        EffectSpec::new(
            "reserve_inventory",
            INVENTORY_TASK_QUEUE,
            inventory_retry(),
            Duration::from_secs(5),
        ),
        EffectSpec::new(
            "unreserve_inventory",
            INVENTORY_TASK_QUEUE,
            inventory_retry(),
            Duration::from_secs(5),
        ),
        EffectSpec::new(
            "update_inventory",
            INVENTORY_TASK_QUEUE,
            inventory_retry(),
            Duration::from_secs(5),
        ),
    ]
}
