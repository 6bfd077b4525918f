//! Booking service: loads bookings and runs each command through the
//! [`BookingReducer`] inside a runtime [`Store`].

use crate::aggregates::booking::{
    BOOKINGS, Booking, BookingAction, BookingChanges, BookingDraft, BookingEnvironment,
    BookingError, BookingLifecycle, BookingReducer, BookingState, BookingTransition,
};
use crate::metrics;
use crate::types::BookingId;
use backline_core::environment::Clock;
use backline_core::record_store::{Filter, Order, Query, RecordStore, from_record, from_records};
use backline_runtime::Store;
use std::sync::Arc;

/// Booking reads and commands.
#[derive(Clone)]
pub struct BookingService {
    environment: BookingEnvironment,
}

impl BookingService {
    /// Creates a new `BookingService`
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            environment: BookingEnvironment::new(store, clock),
        }
    }

    /// Bookings in `state` (or all), by event date with TBD dates last.
    ///
    /// # Errors
    ///
    /// Store failures.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, state: Option<BookingLifecycle>) -> Result<Vec<Booking>, BookingError> {
        let mut query = Query::table(BOOKINGS)
            .order_by(Order::asc("event_date"))
            .order_by(Order::asc("created_at"));
        if let Some(state) = state {
            query = query.filter(Filter::eq("state", state.as_str()));
        }
        let rows = self.environment.store.select(query).await?;
        Ok(from_records(rows)?)
    }

    /// One booking.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown id.
    pub async fn get(&self, id: BookingId) -> Result<Booking, BookingError> {
        let row = self
            .environment
            .store
            .select(Query::table(BOOKINGS).filter(Filter::eq("id", id)).limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or(BookingError::NotFound(id))?;
        Ok(from_record(row)?)
    }

    /// Create a booking in `inquiry`.
    ///
    /// # Errors
    ///
    /// [`BookingError::Validation`] for missing or malformed fields.
    #[tracing::instrument(skip(self, draft), fields(venue = %draft.venue_name))]
    pub async fn create(&self, draft: BookingDraft) -> Result<Booking, BookingError> {
        let booking = self
            .run(BookingState::default(), BookingAction::Create { draft })
            .await?;
        metrics::record_booking("created");
        tracing::info!(booking_id = %booking.id, "Booking created");
        Ok(booking)
    }

    /// Apply an admin action.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] for an unknown id
    /// - [`BookingError::IllegalTransition`] when the table has no such edge
    /// - [`BookingError::Validation`] when confirming without an event date
    /// - [`BookingError::Conflict`] when the state changed underneath
    #[tracing::instrument(skip(self))]
    pub async fn transition(
        &self,
        id: BookingId,
        action: BookingTransition,
    ) -> Result<Booking, BookingError> {
        let current = self.get(id).await?;
        let from = current.state;
        let booking = self
            .run(BookingState::loaded(current), BookingAction::Transition { action })
            .await?;
        metrics::record_transition(booking.state.as_str());
        tracing::info!(booking_id = %id, %from, to = %booking.state, "Booking transitioned");
        Ok(booking)
    }

    /// Replace editable fields, optionally moving state by one edge.
    ///
    /// # Errors
    ///
    /// As [`BookingService::transition`], plus validation of the new fields.
    #[tracing::instrument(skip(self, changes))]
    pub async fn edit(&self, id: BookingId, changes: BookingChanges) -> Result<Booking, BookingError> {
        let current = self.get(id).await?;
        let from = current.state;
        let booking = self
            .run(BookingState::loaded(current), BookingAction::Edit { changes })
            .await?;
        metrics::record_booking("edited");
        if booking.state != from {
            metrics::record_transition(booking.state.as_str());
        }
        tracing::info!(booking_id = %id, state = %booking.state, "Booking edited");
        Ok(booking)
    }

    async fn run(&self, state: BookingState, command: BookingAction) -> Result<Booking, BookingError> {
        let store = Store::new(state, BookingReducer::new(), self.environment.clone());
        let mut handle = store.send(command).await?;
        handle.wait().await?;
        let outcome = store.state(BookingState::outcome).await;
        store.shutdown();

        if let Err(error) = &outcome {
            let reason = match error {
                BookingError::IllegalTransition { .. } => "illegal",
                BookingError::Conflict(_) => "conflict",
                BookingError::Validation(_) => "validation",
                BookingError::NotFound(_) => "not_found",
                BookingError::Store(_) | BookingError::Runtime(_) => "error",
            };
            metrics::record_rejection(reason);
            tracing::warn!(%error, reason, "Booking command rejected");
        }
        outcome
    }
}
