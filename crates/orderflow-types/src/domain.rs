//! Wire-stable enumerations shared by workflow inputs, outputs, and query
//! results (§6). These are *business* statuses, orthogonal to the engine's
//! five-value `InstanceStatus` — a workflow can be engine-`Completed` while
//! its last `OrderStatus` is `Rejected`.
//!
//! Serialized as their original upper-snake-case wire values (matching the
//! Python/Temporal source this spec was distilled from) via `serde`'s
//! `rename_all = "SCREAMING_SNAKE_CASE"`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    ValidationPending,
    ValidationFailed,
    AutoRejected,
    PendingApproval,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CreditCard,
    BankTransfer,
    Cash,
    EWallet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryStatus {
    InStock,
    LowStock,
    OutOfStock,
    Discontinued,
    Pending,
    Reserved,
    Completed,
    Failed,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_round_trips_wire_values() {
        let s = serde_json::to_string(&OrderStatus::PendingApproval).unwrap();
        assert_eq!(s, "\"PENDING_APPROVAL\"");
        let back: OrderStatus = serde_json::from_str(&s).unwrap();
        assert_eq!(back, OrderStatus::PendingApproval);
    }

    #[test]
    fn inventory_status_round_trips_wire_values() {
        let s = serde_json::to_string(&InventoryStatus::OutOfStock).unwrap();
        assert_eq!(s, "\"OUT_OF_STOCK\"");
    }
}
