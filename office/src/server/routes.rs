//! Router configuration for the back-office.
//!
//! Everything under `/api/admin` requires a bearer session (enforced by the
//! [`AdminSession`](super::AdminSession) extractor in each handler).

use super::state::AppState;
use crate::api::{auth, bookings, chat, contacts, inquiries, invoices, payments, roster};
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use backline_web::correlation_id_layer;
use backline_web::handlers::health::{health_check, readiness_check};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/sign-in", post(auth::sign_in))
        .route("/sign-out", post(auth::sign_out))
        .route("/reset-password", post(auth::reset_password))
        .route("/session", get(auth::current_session));

    let admin_routes = Router::new()
        // Bookings
        .route(
            "/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route(
            "/bookings/:id",
            get(bookings::get_booking).put(bookings::edit_booking),
        )
        .route(
            "/bookings/:id/transitions",
            get(bookings::available_transitions).post(bookings::apply_transition),
        )
        // Inquiries
        .route("/inbox", get(inquiries::inbox))
        .route("/conversations", get(inquiries::list_conversations))
        .route(
            "/conversations/:id",
            delete(inquiries::delete_conversation),
        )
        .route("/conversations/:id/messages", get(inquiries::list_messages))
        .route("/conversations/:id/status", put(inquiries::set_status))
        .route(
            "/conversations/:id/booking-draft",
            get(inquiries::booking_draft_for),
        )
        .route("/conversations/:id/promote", post(inquiries::promote))
        // Contacts
        .route("/summary", get(contacts::summary))
        .route(
            "/contacts",
            get(contacts::list_contacts).post(contacts::create_contact),
        )
        .route("/contacts/bulk-delete", post(contacts::bulk_delete_contacts))
        .route("/contacts/export", get(contacts::export_contacts))
        .route("/contacts/import", post(contacts::import_contacts))
        .route(
            "/contacts/:id",
            get(contacts::get_contact)
                .put(contacts::update_contact)
                .delete(contacts::delete_contact),
        )
        // Payments
        .route(
            "/payments",
            get(payments::list_payments).post(payments::create_payment),
        )
        .route("/payments/bulk-delete", post(payments::bulk_delete_payments))
        .route("/payments/export", get(payments::export_payments))
        .route("/payments/import", post(payments::import_payments))
        .route(
            "/payments/:id",
            get(payments::get_payment)
                .put(payments::update_payment)
                .delete(payments::delete_payment),
        )
        // Invoices
        .route(
            "/invoices",
            get(invoices::list_invoices).post(invoices::create_invoice),
        )
        .route("/invoices/totals", post(invoices::preview_totals))
        .route("/invoices/print-layout", get(invoices::print_layout))
        .route(
            "/invoices/:id",
            get(invoices::get_invoice)
                .put(invoices::update_invoice)
                .delete(invoices::delete_invoice),
        )
        .route("/invoices/:id/mark-paid", post(invoices::mark_paid))
        .route("/invoices/:id/email", get(invoices::invoice_email))
        // Roster
        .route(
            "/band-members",
            get(roster::list_members).post(roster::create_member),
        )
        .route(
            "/band-members/:id",
            put(roster::update_member).delete(roster::delete_member),
        )
        .route(
            "/band-members/:id/availability-chat",
            post(roster::availability_chat),
        )
        .route(
            "/availability",
            get(roster::list_availability).post(roster::add_availability),
        )
        .route(
            "/availability/:id",
            put(roster::edit_availability).delete(roster::delete_availability),
        );

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .route("/chat", post(chat::relay))
        .nest("/admin", admin_routes);

    Router::new()
        // Health checks (no authentication)
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
