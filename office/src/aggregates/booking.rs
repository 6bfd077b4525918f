//! Booking aggregate.
//!
//! A booking moves through a fixed lifecycle:
//!
//! ```text
//! inquiry → proposal_sent → negotiating → pending_approval → approved → contract_sent → confirmed → completed
//!    └─────────────┴──────────────┴──→ pending_approval          (submit for approval)
//! any non-terminal ──→ cancelled
//! ```
//!
//! Every legal edge lives in [`TRANSITION_TABLE`]; nothing else can move a
//! booking. The [`BookingReducer`] validates commands against the table and
//! persists accepted changes with a compare-and-set on the previous state.

use crate::types::{BookingId, ConversationId, Money};
use backline_core::{
    SmallVec,
    effect::Effect,
    environment::Clock,
    record_store::{Filter, Mutation, Record, RecordStore, RecordStoreError, from_record, to_record},
    reducer::Reducer,
    smallvec,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Record store table holding bookings.
pub const BOOKINGS: &str = "bookings";

/// Legacy free-text status written on creation.
pub const INITIAL_STATUS: &str = "pending_approval";

// ============================================================================
// Lifecycle
// ============================================================================

/// Lifecycle state of a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingLifecycle {
    /// Initial state of every booking
    Inquiry,
    /// A proposal went out to the venue
    ProposalSent,
    /// Terms are being negotiated
    Negotiating,
    /// Waiting for the band to approve
    PendingApproval,
    /// Approved by the band
    Approved,
    /// Contract sent to the venue
    ContractSent,
    /// Contract signed; requires an event date
    Confirmed,
    /// Terminal: called off
    Cancelled,
    /// Terminal: played; requires an event date
    Completed,
}

impl BookingLifecycle {
    /// Every state, in lifecycle order.
    pub const ALL: [Self; 9] = [
        Self::Inquiry,
        Self::ProposalSent,
        Self::Negotiating,
        Self::PendingApproval,
        Self::Approved,
        Self::ContractSent,
        Self::Confirmed,
        Self::Cancelled,
        Self::Completed,
    ];

    /// Wire name (`pending_approval`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inquiry => "inquiry",
            Self::ProposalSent => "proposal_sent",
            Self::Negotiating => "negotiating",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::ContractSent => "contract_sent",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// `cancelled` and `completed` accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    /// States that cannot be reached without an event date.
    #[must_use]
    pub const fn requires_event_date(self) -> bool {
        matches!(self, Self::Confirmed | Self::Completed)
    }

    /// Look up `action` in the transition table.
    #[must_use]
    pub fn apply(self, action: BookingTransition) -> Option<Self> {
        TRANSITION_TABLE
            .iter()
            .find(|(from, a, _)| *from == self && *a == action)
            .map(|(_, _, to)| *to)
    }

    /// Whether one edge of the table leads from `self` to `to`.
    #[must_use]
    pub fn can_move_to(self, to: Self) -> bool {
        TRANSITION_TABLE
            .iter()
            .any(|(from, _, target)| *from == self && *target == to)
    }
}

impl fmt::Display for BookingLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingLifecycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown booking state {s:?}"))
    }
}

/// Admin action on a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingTransition {
    /// inquiry → `proposal_sent`
    SendProposal,
    /// `proposal_sent` → negotiating
    BeginNegotiation,
    /// inquiry, `proposal_sent`, negotiating → `pending_approval`
    SubmitForApproval,
    /// `pending_approval` → approved
    Approve,
    /// approved → `contract_sent`
    SendContract,
    /// `contract_sent` → confirmed
    MarkConfirmed,
    /// confirmed → completed
    MarkCompleted,
    /// any non-terminal → cancelled
    Cancel,
}

impl BookingTransition {
    /// Every admin action.
    pub const ALL: [Self; 8] = [
        Self::SendProposal,
        Self::BeginNegotiation,
        Self::SubmitForApproval,
        Self::Approve,
        Self::SendContract,
        Self::MarkConfirmed,
        Self::MarkCompleted,
        Self::Cancel,
    ];

    /// Wire name (`submit_for_approval`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendProposal => "send_proposal",
            Self::BeginNegotiation => "begin_negotiation",
            Self::SubmitForApproval => "submit_for_approval",
            Self::Approve => "approve",
            Self::SendContract => "send_contract",
            Self::MarkConfirmed => "mark_confirmed",
            Self::MarkCompleted => "mark_completed",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for BookingTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use BookingLifecycle as L;
use BookingTransition as T;

/// Every legal edge: (from, action, to).
pub const TRANSITION_TABLE: [(BookingLifecycle, BookingTransition, BookingLifecycle); 16] = [
    (L::Inquiry, T::SendProposal, L::ProposalSent),
    (L::ProposalSent, T::BeginNegotiation, L::Negotiating),
    (L::Inquiry, T::SubmitForApproval, L::PendingApproval),
    (L::ProposalSent, T::SubmitForApproval, L::PendingApproval),
    (L::Negotiating, T::SubmitForApproval, L::PendingApproval),
    (L::PendingApproval, T::Approve, L::Approved),
    (L::Approved, T::SendContract, L::ContractSent),
    (L::ContractSent, T::MarkConfirmed, L::Confirmed),
    (L::Confirmed, T::MarkCompleted, L::Completed),
    (L::Inquiry, T::Cancel, L::Cancelled),
    (L::ProposalSent, T::Cancel, L::Cancelled),
    (L::Negotiating, T::Cancel, L::Cancelled),
    (L::PendingApproval, T::Cancel, L::Cancelled),
    (L::Approved, T::Cancel, L::Cancelled),
    (L::ContractSent, T::Cancel, L::Cancelled),
    (L::Confirmed, T::Cancel, L::Cancelled),
];

// ============================================================================
// Entity
// ============================================================================

/// A gig booking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking id
    pub id: BookingId,
    /// Event date; unset means TBD
    pub event_date: Option<NaiveDate>,
    /// Start time; unset means TBD
    pub event_time: Option<NaiveTime>,
    /// Venue name
    pub venue_name: String,
    /// Venue-side contact person
    pub contact_name: String,
    /// Venue-side contact email
    pub contact_email: String,
    /// Expected headcount
    pub estimated_attendance: Option<u32>,
    /// Agreed fee
    pub payment_amount: Option<Money>,
    /// Free-text notes
    #[serde(default)]
    pub notes: String,
    /// Authoritative lifecycle state
    pub state: BookingLifecycle,
    /// Legacy free-text status, written on creation only
    #[serde(default)]
    pub status: String,
    /// Inquiry this booking was promoted from
    pub conversation_id: Option<ConversationId>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last write
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a booking (also the editable fields).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingDraft {
    /// Event date
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    /// Start time
    #[serde(default)]
    pub event_time: Option<NaiveTime>,
    /// Venue name
    pub venue_name: String,
    /// Contact person
    pub contact_name: String,
    /// Contact email
    pub contact_email: String,
    /// Expected headcount
    #[serde(default)]
    pub estimated_attendance: Option<u32>,
    /// Agreed fee
    #[serde(default, alias = "amount")]
    pub payment_amount: Option<Money>,
    /// Free-text notes
    #[serde(default)]
    pub notes: String,
}

/// Full replacement of a booking's editable fields, optionally moving state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingChanges {
    /// Replacement field values
    #[serde(flatten)]
    pub fields: BookingDraft,
    /// Target state; must be the current one or one edge away
    #[serde(default)]
    pub state: Option<BookingLifecycle>,
}

/// Row written when a booking is created.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewBooking {
    /// Pre-assigned id
    pub id: BookingId,
    /// Draft fields
    #[serde(flatten)]
    pub fields: BookingDraft,
    /// Always `inquiry`
    pub state: BookingLifecycle,
    /// Always `pending_approval`
    pub status: String,
    /// Source inquiry, for promoted bookings
    pub conversation_id: Option<ConversationId>,
    /// Creation time (also the first `updated_at`)
    pub updated_at: DateTime<Utc>,
}

impl NewBooking {
    /// Validate `draft` and build the row for a new booking.
    ///
    /// # Errors
    ///
    /// [`BookingError::Validation`] when a required field is missing or malformed.
    pub fn from_draft(
        draft: BookingDraft,
        conversation_id: Option<ConversationId>,
        now: DateTime<Utc>,
    ) -> Result<Self, BookingError> {
        validate_draft(&draft)?;
        Ok(Self {
            id: BookingId::new(),
            fields: draft,
            state: BookingLifecycle::Inquiry,
            status: INITIAL_STATUS.to_string(),
            conversation_id,
            updated_at: now,
        })
    }
}

#[derive(Serialize)]
struct StatePatch {
    state: BookingLifecycle,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct EditPatch<'a> {
    #[serde(flatten)]
    fields: &'a BookingDraft,
    state: BookingLifecycle,
    updated_at: DateTime<Utc>,
}

/// Check the required booking fields.
///
/// # Errors
///
/// [`BookingError::Validation`] naming the first offending field.
pub fn validate_draft(draft: &BookingDraft) -> Result<(), BookingError> {
    if draft.venue_name.trim().is_empty() {
        return Err(BookingError::Validation("venue_name is required".into()));
    }
    if draft.contact_name.trim().is_empty() {
        return Err(BookingError::Validation("contact_name is required".into()));
    }
    if !looks_like_email(&draft.contact_email) {
        return Err(BookingError::Validation(
            "contact_email must be an email address".into(),
        ));
    }
    if draft.payment_amount.is_some_and(|amount| amount.is_negative()) {
        return Err(BookingError::Validation(
            "payment_amount must not be negative".into(),
        ));
    }
    Ok(())
}

/// `local@domain.tld` with no whitespace.
#[must_use]
pub fn looks_like_email(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        },
        None => false,
    }
}

fn date_required(to: BookingLifecycle) -> BookingError {
    BookingError::Validation(format!(
        "An event date is required before a booking can be {to}"
    ))
}

// ============================================================================
// Errors
// ============================================================================

/// Failure of a booking operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    /// No booking with this id.
    #[error("Booking {0} not found")]
    NotFound(BookingId),

    /// The transition table has no such edge.
    #[error("Cannot {action} a booking in state {from}")]
    IllegalTransition {
        /// Current state
        from: BookingLifecycle,
        /// Requested action (or `move to <state>` for edits)
        action: String,
    },

    /// Input rejected.
    #[error("{0}")]
    Validation(String),

    /// The booking changed state between load and write.
    #[error("Booking {0} was changed by someone else; reload and try again")]
    Conflict(BookingId),

    /// Record store failure.
    #[error(transparent)]
    Store(#[from] RecordStoreError),

    /// The runtime failed to run the command.
    #[error("Booking command failed: {0}")]
    Runtime(String),
}

impl From<backline_runtime::StoreError> for BookingError {
    fn from(error: backline_runtime::StoreError) -> Self {
        Self::Runtime(error.to_string())
    }
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the booking aggregate
#[derive(Clone, Debug, PartialEq)]
pub enum BookingAction {
    // Commands
    /// Create a booking in `inquiry`
    Create {
        /// Booking fields
        draft: BookingDraft,
    },
    /// Apply an admin action to the loaded booking
    Transition {
        /// Requested action
        action: BookingTransition,
    },
    /// Replace the loaded booking's fields, optionally moving state
    Edit {
        /// Replacement values
        changes: BookingChanges,
    },

    // Events
    /// A create command passed validation
    Created {
        /// Row about to be inserted
        row: NewBooking,
    },
    /// A state change passed the table and validations
    TransitionAccepted {
        /// Previous state
        from: BookingLifecycle,
        /// New state
        to: BookingLifecycle,
        /// When
        at: DateTime<Utc>,
    },
    /// The write reached the record store
    Persisted {
        /// Booking as stored
        booking: Booking,
    },
    /// The write was rejected by the record store
    PersistFailed {
        /// Reason
        error: BookingError,
    },
    /// The command was rejected before any write
    ValidationFailed {
        /// Reason
        error: BookingError,
    },
}

// ============================================================================
// State
// ============================================================================

/// State of one booking command run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BookingState {
    /// The booking being worked on
    pub booking: Option<Booking>,
    /// Set once the store confirmed the write
    pub persisted: bool,
    /// Why the last command failed
    pub last_error: Option<BookingError>,
}

impl BookingState {
    /// State for a booking loaded from the store.
    #[must_use]
    pub fn loaded(booking: Booking) -> Self {
        Self {
            booking: Some(booking),
            ..Self::default()
        }
    }

    /// Result of the command once its effects have finished.
    ///
    /// # Errors
    ///
    /// The recorded failure, or [`BookingError::Runtime`] if the command
    /// produced neither a failure nor a persisted booking.
    pub fn outcome(&self) -> Result<Booking, BookingError> {
        if let Some(error) = &self.last_error {
            return Err(error.clone());
        }
        match (&self.booking, self.persisted) {
            (Some(booking), true) => Ok(booking.clone()),
            _ => Err(BookingError::Runtime(
                "booking command finished without a result".into(),
            )),
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the booking aggregate
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Record store holding the `bookings` table
    pub store: Arc<dyn RecordStore>,
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
}

impl BookingEnvironment {
    /// Creates a new `BookingEnvironment`
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the booking aggregate
#[derive(Clone, Debug, Default)]
pub struct BookingReducer;

impl BookingReducer {
    /// Creates a new `BookingReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Applies an event to state
    fn apply_event(state: &mut BookingState, action: &BookingAction) {
        match action {
            BookingAction::Created { .. } => {
                state.persisted = false;
                state.last_error = None;
            },
            BookingAction::TransitionAccepted { to, at, .. } => {
                if let Some(booking) = state.booking.as_mut() {
                    booking.state = *to;
                    booking.updated_at = *at;
                }
                state.last_error = None;
            },
            BookingAction::Persisted { booking } => {
                state.booking = Some(booking.clone());
                state.persisted = true;
                state.last_error = None;
            },
            BookingAction::PersistFailed { error } | BookingAction::ValidationFailed { error } => {
                state.last_error = Some(error.clone());
            },
            // Commands don't modify state
            BookingAction::Create { .. }
            | BookingAction::Transition { .. }
            | BookingAction::Edit { .. } => {},
        }
    }

    fn reject(state: &mut BookingState, error: BookingError) -> SmallVec<[Effect<BookingAction>; 4]> {
        Self::apply_event(state, &BookingAction::ValidationFailed { error });
        SmallVec::new()
    }

    /// Write `mutation` and feed back `Persisted` or `PersistFailed`.
    fn persist(
        env: &BookingEnvironment,
        mutation: Mutation,
        id: BookingId,
    ) -> Effect<BookingAction> {
        let store = Arc::clone(&env.store);
        Effect::future(async move {
            let action = match store.execute(mutation).await {
                Ok(rows) => match rows.into_iter().next().map(from_record::<Booking>) {
                    Some(Ok(booking)) => BookingAction::Persisted { booking },
                    Some(Err(error)) => BookingAction::PersistFailed {
                        error: error.into(),
                    },
                    None => BookingAction::PersistFailed {
                        error: BookingError::NotFound(id),
                    },
                },
                Err(RecordStoreError::PreconditionFailed { .. }) => BookingAction::PersistFailed {
                    error: BookingError::Conflict(id),
                },
                Err(error) => BookingAction::PersistFailed {
                    error: error.into(),
                },
            };
            Some(action)
        })
    }

    /// Guarded update: only applies while the row is still in `from`.
    fn compare_and_set(
        env: &BookingEnvironment,
        id: BookingId,
        from: BookingLifecycle,
        patch: Result<Record, RecordStoreError>,
    ) -> Result<Effect<BookingAction>, BookingError> {
        let mutation = Mutation::guarded_update(
            BOOKINGS,
            patch?,
            vec![Filter::eq("id", id), Filter::eq("state", from.as_str())],
        );
        Ok(Self::persist(env, mutation, id))
    }
}

impl Reducer for BookingReducer {
    type State = BookingState;
    type Action = BookingAction;
    type Environment = BookingEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Create ==========
            BookingAction::Create { draft } => {
                let row = match NewBooking::from_draft(draft, None, env.clock.now()) {
                    Ok(row) => row,
                    Err(error) => return Self::reject(state, error),
                };
                let record = match to_record(&row) {
                    Ok(record) => record,
                    Err(error) => return Self::reject(state, error.into()),
                };
                let id = row.id;
                Self::apply_event(state, &BookingAction::Created { row });
                smallvec![Self::persist(env, Mutation::insert(BOOKINGS, record), id)]
            },

            // ========== Transition ==========
            BookingAction::Transition { action } => {
                let Some(booking) = state.booking.as_ref() else {
                    return Self::reject(state, BookingError::Validation("no booking loaded".into()));
                };
                let (id, from) = (booking.id, booking.state);
                let Some(to) = from.apply(action) else {
                    return Self::reject(
                        state,
                        BookingError::IllegalTransition {
                            from,
                            action: action.to_string(),
                        },
                    );
                };
                if to.requires_event_date() && booking.event_date.is_none() {
                    return Self::reject(state, date_required(to));
                }

                let at = env.clock.now();
                let patch = to_record(&StatePatch { state: to, updated_at: at });
                match Self::compare_and_set(env, id, from, patch) {
                    Ok(effect) => {
                        Self::apply_event(state, &BookingAction::TransitionAccepted { from, to, at });
                        smallvec![effect]
                    },
                    Err(error) => Self::reject(state, error),
                }
            },

            // ========== Edit ==========
            BookingAction::Edit { changes } => {
                let Some(booking) = state.booking.as_ref() else {
                    return Self::reject(state, BookingError::Validation("no booking loaded".into()));
                };
                let (id, from) = (booking.id, booking.state);
                if let Err(error) = validate_draft(&changes.fields) {
                    return Self::reject(state, error);
                }
                let to = changes.state.unwrap_or(from);
                if to != from && !from.can_move_to(to) {
                    return Self::reject(
                        state,
                        BookingError::IllegalTransition {
                            from,
                            action: format!("move to {to}"),
                        },
                    );
                }
                if to.requires_event_date() && changes.fields.event_date.is_none() {
                    return Self::reject(state, date_required(to));
                }

                let at = env.clock.now();
                let patch = to_record(&EditPatch {
                    fields: &changes.fields,
                    state: to,
                    updated_at: at,
                });
                match Self::compare_and_set(env, id, from, patch) {
                    Ok(effect) => {
                        if to != from {
                            Self::apply_event(state, &BookingAction::TransitionAccepted { from, to, at });
                        }
                        smallvec![effect]
                    },
                    Err(error) => Self::reject(state, error),
                }
            },

            // ========== Events ==========
            event @ (BookingAction::Created { .. }
            | BookingAction::TransitionAccepted { .. }
            | BookingAction::Persisted { .. }
            | BookingAction::PersistFailed { .. }
            | BookingAction::ValidationFailed { .. }) => {
                Self::apply_event(state, &event);
                SmallVec::new()
            },
        }
    }
}
