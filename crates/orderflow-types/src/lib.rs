pub mod domain;
pub mod effect_spec;
pub mod error;
pub mod event;
pub mod ids;
pub mod journal;
pub mod payload;
pub mod retry;

pub use domain::{InventoryStatus, OrderStatus, PaymentMethod, PaymentStatus};
pub use effect_spec::EffectSpec;
pub use error::{ErrorKind, ExecutionError};
pub use event::EventType;
pub use ids::{FutureId, RunId, WorkflowId};
pub use journal::{InstanceStatus, JournalEntry};
pub use payload::{Codec, Payload};
pub use retry::RetryPolicy;
