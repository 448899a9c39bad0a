//! # OpsAudit Event Hub
//!
//! Fan-out of workflow change events to live viewers over a push channel.
//!
//! ```text
//! workflow transition ─┐
//! import pipeline ─────┼─ HubHandle::broadcast ─▶ EventHub (actor)
//! spot-check ──────────┘                             │ owns the registry
//!                                                    ├─▶ viewer queue (SSE relay)
//!                                                    ├─▶ viewer queue
//!                                                    └─▶ viewer queue
//! ```
//!
//! Delivery is best-effort: bounded queues everywhere, drops are logged and
//! never surface to the producing request.

pub mod events;
pub mod hub;

pub use events::{Event, EventKind};
pub use hub::{ClientSubscription, DEFAULT_QUEUE_CAPACITY, EventHub, HubHandle};
