//! # Event subscribers for the procvisor runtime.
//!
//! This module provides the [`Subscribe`] trait and built-in
//! implementations for handling runtime events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   NodeSupervisor ── publish(Event) ──► Bus ──► Supervisor listener
//!                                                     │
//!                                               SubscriberSet::emit
//!                                                     │
//!                                          ┌──────────┼──────────┐
//!                                          ▼          ▼          ▼
//!                                      LogWriter  dashboard   custom ...
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use procvisor::{Subscribe, Event, EventKind};
//! use async_trait::async_trait;
//!
//! struct CrashCounter;
//!
//! #[async_trait]
//! impl Subscribe for CrashCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::NodeExited {
//!             // increment a counter, ping an alerting hook, ...
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "crash_counter" }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
