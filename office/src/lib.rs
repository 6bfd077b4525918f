//! Backline office - the back-office service of a working band
//!
//! Tracks gigs from first venue inquiry through confirmation and completion,
//! keeps the contacts/payments/invoices ledger, and coordinates band member
//! availability.
//!
//! # Architecture
//!
//! ```text
//! HTTP (axum) ──► api handlers ──► services ──► RecordStore (PostgreSQL)
//!                      │               │
//!                      │               ├─► BookingReducer (lifecycle rules)
//!                      │               └─► ChatAgent (external AI agent)
//!                      └─► InboxReducer run on a Store per request
//! ```
//!
//! # Key Features
//!
//! - **Booking lifecycle**: a pure transition table shared by the reducer,
//!   the edit form and the transitions endpoint
//! - **Inquiry inbox**: agent-created conversations, filtered, selected and
//!   promoted into bookings
//! - **Ledger**: contacts, payments and invoices with totals always computed
//!   server-side
//! - **CSV transfer**: tolerant row-by-row import and full export
//! - **Roster**: band members and their block-out dates
//!
//! # Quick Start
//!
//! ```bash
//! export DATABASE_URL=postgres://localhost/backline
//! cargo run --bin server
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregates;
pub mod api;
pub mod config;
pub mod metrics;
pub mod server;
pub mod services;
pub mod types;

/// In-memory schema for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::Config;
pub use server::{AppState, build_router};
