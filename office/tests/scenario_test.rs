//! End-to-end service scenarios over the in-memory record store.
//!
//! Run with: `cargo test --test scenario_test`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use backline_core::record_store::{RecordStore, to_record};
use backline_office::aggregates::booking::{BookingDraft, BookingError, BookingLifecycle, BookingTransition};
use backline_office::services::inquiries::{CONVERSATIONS, ConversationStatus};
use backline_office::services::ledger::{
    ContactDraft, INVOICES, InvoiceDraft, InvoiceStatus, LedgerError, PAYMENTS, PaymentDraft,
};
use backline_office::services::invoicing::InvoiceItemDraft;
use backline_office::services::{BookingService, InquiryService, LedgerService};
use backline_office::testing::office_schema;
use backline_office::types::{ConversationId, Money};
use backline_testing::{InMemoryRecordStore, test_clock};
use serde_json::json;
use std::sync::Arc;

fn ledger(store: &InMemoryRecordStore) -> LedgerService {
    LedgerService::new(Arc::new(store.clone()), Arc::new(test_clock()))
}

fn jo() -> ContactDraft {
    ContactDraft {
        first_name: "Jo".into(),
        email: "jo@x.com".into(),
        ..ContactDraft::default()
    }
}

fn gig() -> BookingDraft {
    BookingDraft {
        venue_name: "The Hall".into(),
        contact_name: "Sam".into(),
        contact_email: "sam@hall.org".into(),
        ..BookingDraft::default()
    }
}

#[tokio::test]
async fn invoice_for_jo_totals_and_settles_once() {
    let store = InMemoryRecordStore::new(office_schema());
    let ledger = ledger(&store);
    let contact = ledger.create_contact(jo()).await.unwrap();

    let invoice = ledger
        .save_invoice(
            None,
            InvoiceDraft {
                contact_id: contact.id,
                tax: Some(8.0),
                items: vec![InvoiceItemDraft {
                    description: "Show".into(),
                    quantity: 1.0,
                    rate: Money::from_dollars(1500),
                }],
                ..InvoiceDraft::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(invoice.subtotal, Money::from_dollars(1500));
    assert_eq!(invoice.total, Money::from_dollars(1620));

    let paid = ledger.mark_invoice_paid(invoice.id).await.unwrap();
    assert_eq!(paid.invoice.status, InvoiceStatus::Paid);
    assert_eq!(paid.payment.amount, Money::from_dollars(1620));
    assert_eq!(paid.payment.contact_id, contact.id);
    assert_eq!(paid.payment.invoice_id, Some(invoice.id));

    let again = ledger.mark_invoice_paid(invoice.id).await;
    assert!(matches!(again, Err(LedgerError::AlreadyPaid(_))));
    assert_eq!(store.count(PAYMENTS), 1);

    let payments = ledger.list_payments().await.unwrap();
    let summary = payments[0].contacts.as_ref().unwrap();
    assert_eq!(summary.email, "jo@x.com");
}

#[tokio::test]
async fn referenced_contact_survives_delete_attempts() {
    let store = InMemoryRecordStore::new(office_schema());
    let ledger = ledger(&store);
    let contact = ledger.create_contact(jo()).await.unwrap();
    ledger
        .save_invoice(
            None,
            InvoiceDraft {
                contact_id: contact.id,
                ..InvoiceDraft::default()
            },
        )
        .await
        .unwrap();
    ledger
        .create_payment(PaymentDraft {
            contact_id: contact.id,
            amount: Money::from_dollars(200),
            ..PaymentDraft::default()
        })
        .await
        .unwrap();

    assert_eq!(
        ledger.delete_contact(contact.id).await,
        Err(LedgerError::HasDependents)
    );
    let outcome = ledger.bulk_delete_contacts(&[contact.id]).await;
    assert_eq!(outcome.failed, 1);

    assert_eq!(ledger.get_contact(contact.id).await.unwrap(), contact);
    assert_eq!(store.count(INVOICES), 1);
    assert_eq!(store.count(PAYMENTS), 1);
}

#[tokio::test]
async fn promoting_an_inquiry_is_all_or_nothing() {
    let store = InMemoryRecordStore::new(office_schema());
    let clock = Arc::new(test_clock());
    let inquiries = InquiryService::new(Arc::new(store.clone()), clock.clone());
    let bookings = BookingService::new(Arc::new(store.clone()), clock);

    let row = store
        .insert(
            CONVERSATIONS,
            to_record(&json!({
                "participants": [{"name": "Sam", "email": "sam@hall.org", "type": "venue", "venue_name": "The Hall"}],
                "status": "active"
            }))
            .unwrap(),
        )
        .await
        .unwrap();
    let id: ConversationId = serde_json::from_value(row["id"].clone()).unwrap();

    // Invalid fields: nothing is written.
    let rejected = inquiries
        .promote_to_booking(
            id,
            BookingDraft {
                contact_email: "not-an-email".into(),
                ..gig()
            },
        )
        .await;
    assert!(rejected.is_err());
    assert_eq!(
        inquiries.get_conversation(id).await.unwrap().status,
        ConversationStatus::Active
    );
    assert!(bookings.list(None).await.unwrap().is_empty());

    let booking = inquiries.promote_to_booking(id, gig()).await.unwrap();
    assert_eq!(booking.state, BookingLifecycle::Inquiry);
    assert_eq!(booking.conversation_id, Some(id));
    assert_eq!(
        inquiries.get_conversation(id).await.unwrap().status,
        ConversationStatus::Resolved
    );
}

#[tokio::test]
async fn approve_is_rejected_outside_pending_approval() {
    let store = InMemoryRecordStore::new(office_schema());
    let bookings = BookingService::new(Arc::new(store.clone()), Arc::new(test_clock()));
    let booking = bookings.create(gig()).await.unwrap();

    let result = bookings.transition(booking.id, BookingTransition::Approve).await;
    assert!(matches!(
        result,
        Err(BookingError::IllegalTransition {
            from: BookingLifecycle::Inquiry,
            ..
        })
    ));
    assert_eq!(
        bookings.get(booking.id).await.unwrap().state,
        BookingLifecycle::Inquiry
    );

    bookings
        .transition(booking.id, BookingTransition::SubmitForApproval)
        .await
        .unwrap();
    let approved = bookings
        .transition(booking.id, BookingTransition::Approve)
        .await
        .unwrap();
    assert_eq!(approved.state, BookingLifecycle::Approved);
}
