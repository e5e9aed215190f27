//! # Order Sync Engine
//!
//! The scheduled jobs of the service:
//!
//! - `OrderReconciler`: mirrors the spreadsheet into storage with converted prices.
//! - `Notifier`: alerts about newly missed delivery deadlines.
//! - `reset_notifications`: re-arms alerts for still-expired orders.
//! - `JobRunner` / `Scheduler`: run any job once, or all of them on their schedules.

pub mod error;
pub mod jobs;
pub mod notifier;
pub mod parsing;
pub mod reconciler;
pub mod scheduler;

pub use error::EngineError;
pub use jobs::{refresh_rate, JobOutcome, JobRunner};
pub use notifier::{reset_notifications, Notifier};
pub use reconciler::OrderReconciler;
pub use scheduler::Scheduler;
