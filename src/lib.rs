// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod detect;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod rules;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::model::{
    ChangeRecord, CheckOutcome, MonitorCycleResult, NotifyOutcome, Severity, Snapshot, Source,
    SourceStatus,
};
pub use crate::monitor::Monitor;
pub use crate::notify::{compose_digest, NotificationTransport, Notifier};
