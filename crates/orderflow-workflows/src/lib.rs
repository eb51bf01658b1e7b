mod inventory_saga;
mod order_approval;
mod payment;
mod registration;

pub use inventory_saga::{
    CheckInventoryEffect, InMemoryInventory, InventoryCheckResult, InventoryRecord, InventorySagaInput,
    InventorySagaOutput, InventorySagaWorkflow, InventoryUpdate, ReserveInventoryEffect, ReservationRecord,
    UnreserveInventoryEffect, UpdateInventoryEffect, UpdatedInventoryRecord,
};
pub use order_approval::{
    HandleCancellationEffect, NotifyManagerEffect, NotifyRejectionEffect, OrderApprovalWorkflow, OrderInput,
    OrderItem, OrderSnapshot, ProcessApprovedOrderEffect, ValidateOrderEffect,
};
pub use payment::{
    PaymentInput, PaymentSnapshot, PaymentWorkflow, ProcessPaymentEffect, RefundPaymentEffect,
    VerifyPaymentStatusEffect,
};
pub use registration::{
    build_engine, effect_specs, INVENTORY_SAGA_WORKFLOW, ORDER_APPROVAL_WORKFLOW, PAYMENT_WORKFLOW,
};
