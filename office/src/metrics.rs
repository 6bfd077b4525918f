//! Business metrics for the back-office.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `backline_bookings_total{event}` - Bookings created, promoted or edited
//! - `backline_booking_transitions_total{to}` - Accepted lifecycle transitions by target state
//! - `backline_booking_rejections_total{reason}` - Rejected transitions (illegal, conflict, validation)
//! - `backline_invoices_saved_total{mode}` - Invoices created or updated
//! - `backline_invoices_paid_total` - Invoices marked paid
//! - `backline_payments_recorded_total{source}` - Payments written (manual, invoice, import)
//! - `backline_revenue_cents_total` - Sum of recorded payment amounts in cents
//! - `backline_csv_rows_total{kind, outcome}` - CSV import rows by outcome
//! - `backline_bulk_deletes_total{table, outcome}` - Bulk delete items by outcome
//! - `backline_agent_fallbacks_total{path}` - Chat agent failures answered locally

use metrics::describe_counter;

/// Register all business metric descriptions.
///
/// Call once at startup, after the Prometheus recorder is installed.
pub fn register_business_metrics() {
    describe_counter!(
        "backline_bookings_total",
        "Bookings written, by event (created, promoted, edited)"
    );
    describe_counter!(
        "backline_booking_transitions_total",
        "Accepted booking lifecycle transitions, by target state"
    );
    describe_counter!(
        "backline_booking_rejections_total",
        "Rejected booking commands, by reason"
    );
    describe_counter!(
        "backline_invoices_saved_total",
        "Invoices saved, by mode (create, update)"
    );
    describe_counter!("backline_invoices_paid_total", "Invoices marked paid");
    describe_counter!(
        "backline_payments_recorded_total",
        "Payments written, by source (manual, invoice, import)"
    );
    describe_counter!(
        "backline_revenue_cents_total",
        "Sum of recorded payment amounts in cents"
    );
    describe_counter!(
        "backline_csv_rows_total",
        "CSV import rows, by kind and outcome"
    );
    describe_counter!(
        "backline_bulk_deletes_total",
        "Bulk delete items, by table and outcome"
    );
    describe_counter!(
        "backline_agent_fallbacks_total",
        "Chat agent failures answered with a local message"
    );

    tracing::info!("Business metrics registered");
}

/// Record a booking write.
pub fn record_booking(event: &'static str) {
    metrics::counter!("backline_bookings_total", "event" => event).increment(1);
}

/// Record an accepted lifecycle transition.
pub fn record_transition(to: &'static str) {
    metrics::counter!("backline_booking_transitions_total", "to" => to).increment(1);
}

/// Record a rejected booking command.
pub fn record_rejection(reason: &'static str) {
    metrics::counter!("backline_booking_rejections_total", "reason" => reason).increment(1);
}

/// Record an invoice save.
pub fn record_invoice_saved(mode: &'static str) {
    metrics::counter!("backline_invoices_saved_total", "mode" => mode).increment(1);
}

/// Record an invoice marked paid.
pub fn record_invoice_paid() {
    metrics::counter!("backline_invoices_paid_total").increment(1);
}

/// Record a payment and its amount.
pub fn record_payment(source: &'static str, cents: i64) {
    metrics::counter!("backline_payments_recorded_total", "source" => source).increment(1);
    if let Ok(cents) = u64::try_from(cents) {
        metrics::counter!("backline_revenue_cents_total").increment(cents);
    }
}

/// Record one CSV import row.
pub fn record_csv_row(kind: &'static str, outcome: &'static str) {
    metrics::counter!("backline_csv_rows_total", "kind" => kind, "outcome" => outcome).increment(1);
}

/// Record one bulk delete item.
pub fn record_bulk_delete(table: &'static str, outcome: &'static str) {
    metrics::counter!("backline_bulk_deletes_total", "table" => table, "outcome" => outcome)
        .increment(1);
}

/// Record a chat agent failure answered locally.
pub fn record_agent_fallback(path: &'static str) {
    metrics::counter!("backline_agent_fallbacks_total", "path" => path).increment(1);
}
