//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by node supervisors and the
//! fleet orchestrator.
//!
//! ## Contents
//! - [`EventKind`], [`Severity`], [`Event`] — event classification and payload
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Supervisor`, `NodeSupervisor`.
//! - **Consumers**: the listener spawned by `Supervisor::attach_subscribers`
//!   (fans out to `SubscriberSet`), plus any external listener obtained via
//!   [`Bus::subscribe`] (dashboards, remote-control layers).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind, Severity};
