//! HTTP + SSE gateway for the records-audit tracker.
//!
//! JSON API under `/api/v1`, plus a Server-Sent Events stream at
//! `/api/v1/events` that relays audit-hub broadcasts to browsers.

pub mod routes;
pub mod server;
pub mod sse;

pub use server::{AppState, build_router, serve};
