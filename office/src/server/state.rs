//! Application state for the back-office HTTP server.
//!
//! Holds the shared record store, the auth provider and one handle per
//! service. Cloning is cheap: everything inside is an `Arc` or wraps one.

use crate::config::BandConfig;
use crate::services::{
    BookingService, ChatRelay, InquiryService, LedgerService, RosterService, TransferService,
};
use axum::extract::FromRef;
use backline_agent::ChatAgent;
use backline_auth::AuthProvider;
use backline_core::environment::Clock;
use backline_core::record_store::RecordStore;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Record store (readiness checks)
    pub store: Arc<dyn RecordStore>,
    /// Auth provider resolving bearer tokens into sessions
    pub auth: Arc<dyn AuthProvider>,
    /// Wall clock (session expiry)
    pub clock: Arc<dyn Clock>,
    /// Band identity
    pub band: BandConfig,
    /// Booking lifecycle
    pub bookings: BookingService,
    /// Inquiry conversations
    pub inquiries: InquiryService,
    /// Contacts, payments and invoices
    pub ledger: LedgerService,
    /// CSV import and export
    pub transfer: TransferService,
    /// Band members and availability
    pub roster: RosterService,
    /// Public chat relay
    pub chat: ChatRelay,
}

impl AppState {
    /// Wire every service over one store, auth provider, agent and clock.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        auth: Arc<dyn AuthProvider>,
        agent: Arc<dyn ChatAgent>,
        clock: Arc<dyn Clock>,
        band: BandConfig,
    ) -> Self {
        let ledger = LedgerService::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            bookings: BookingService::new(Arc::clone(&store), Arc::clone(&clock)),
            inquiries: InquiryService::new(Arc::clone(&store), Arc::clone(&clock)),
            transfer: TransferService::new(ledger.clone()),
            roster: RosterService::new(Arc::clone(&store), Arc::clone(&agent)),
            chat: ChatRelay::new(agent, band.clone()),
            ledger,
            store,
            auth,
            clock,
            band,
        }
    }
}

impl FromRef<AppState> for Arc<dyn RecordStore> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.store)
    }
}
