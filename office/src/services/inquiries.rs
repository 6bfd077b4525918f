//! Inquiry conversations: listing, status changes, hard delete and promotion
//! into a booking.
//!
//! Conversations and their messages are written by the external chat agent;
//! this module only reads them and applies admin decisions.

use crate::aggregates::booking::{BOOKINGS, Booking, BookingDraft, BookingError, NewBooking};
use crate::metrics;
use crate::types::{ConversationId, Money, MessageId};
use backline_core::environment::Clock;
use backline_core::record_store::{
    Filter, Mutation, Order, Query, RecordStore, RecordStoreError, from_record, from_records,
    to_record,
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Record store table holding conversations.
pub const CONVERSATIONS: &str = "conversations";
/// Record store table holding conversation messages.
pub const MESSAGES: &str = "messages";

/// Name and email used when a conversation has no participants.
pub const UNKNOWN_PARTICIPANT: &str = "Unknown";

/// Fee prefilled on the promote form.
pub const DEFAULT_BOOKING_AMOUNT: Money = Money::from_dollars(1500);

/// Admin-set conversation status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    /// Open
    Active,
    /// Handled (set when promoted to a booking)
    Resolved,
    /// Hidden from the default inbox
    Archived,
}

impl ConversationStatus {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "resolved" => Ok(Self::Resolved),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown conversation status {other:?}")),
        }
    }
}

/// Which conversations the inbox shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationFilter {
    /// Everything not archived
    #[default]
    Active,
    /// Archived only
    Archived,
}

/// Role of a conversation participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantType {
    /// Venue-side contact
    Venue,
    /// The chat agent
    Agent,
    /// A band member
    BandMember,
    /// Anyone else
    #[serde(other)]
    Other,
}

/// One participant of a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Email address
    #[serde(default)]
    pub email: String,
    /// Role
    #[serde(rename = "type")]
    pub kind: ParticipantType,
    /// Venue, for venue participants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_name: Option<String>,
}

/// An inquiry thread.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation id
    pub id: ConversationId,
    /// Participants in join order
    #[serde(default)]
    pub participants: Vec<Participant>,
    /// Admin-set status
    pub status: ConversationStatus,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// First venue participant, else the first participant.
    #[must_use]
    pub fn primary_participant(&self) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.kind == ParticipantType::Venue)
            .or_else(|| self.participants.first())
    }
}

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    /// The chat agent
    Agent,
    /// The venue
    Venue,
    /// An admin user
    User,
}

/// A message in a conversation (append-only).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message id
    pub id: MessageId,
    /// Owning conversation
    pub conversation_id: ConversationId,
    /// Author role
    pub sender_type: SenderType,
    /// Author name
    #[serde(default)]
    pub sender_name: String,
    /// Body
    pub content: String,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Failure of an inquiry operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InquiryError {
    /// No conversation with this id.
    #[error("Conversation {0} not found")]
    NotFound(ConversationId),

    /// The promoted booking was rejected.
    #[error(transparent)]
    Booking(#[from] BookingError),

    /// Record store failure.
    #[error(transparent)]
    Store(#[from] RecordStoreError),
}

/// Prefill for the promote form, taken from the primary participant.
#[must_use]
pub fn booking_draft(conversation: &Conversation) -> BookingDraft {
    let (contact_name, contact_email, venue_name) = match conversation.primary_participant() {
        Some(participant) => (
            participant.name.clone(),
            participant.email.clone(),
            participant.venue_name.clone().unwrap_or_default(),
        ),
        None => (
            UNKNOWN_PARTICIPANT.to_string(),
            UNKNOWN_PARTICIPANT.to_string(),
            String::new(),
        ),
    };
    BookingDraft {
        event_date: None,
        event_time: NaiveTime::from_hms_opt(19, 0, 0),
        venue_name,
        contact_name,
        contact_email,
        estimated_attendance: None,
        payment_amount: Some(DEFAULT_BOOKING_AMOUNT),
        notes: String::new(),
    }
}

#[derive(Serialize)]
struct StatusPatch {
    status: ConversationStatus,
}

/// Reads conversations and applies admin decisions to them.
#[derive(Clone)]
pub struct InquiryService {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl InquiryService {
    /// Creates a new `InquiryService`
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Conversations matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    #[tracing::instrument(skip(self))]
    pub async fn list_conversations(
        &self,
        filter: ConversationFilter,
    ) -> Result<Vec<Conversation>, InquiryError> {
        let archived = ConversationStatus::Archived.as_str();
        let status = match filter {
            ConversationFilter::Active => Filter::neq("status", archived),
            ConversationFilter::Archived => Filter::eq("status", archived),
        };
        let rows = self
            .store
            .select(
                Query::table(CONVERSATIONS)
                    .filter(status)
                    .order_by(Order::desc("created_at")),
            )
            .await?;
        Ok(from_records(rows)?)
    }

    /// One conversation.
    ///
    /// # Errors
    ///
    /// [`InquiryError::NotFound`] for an unknown id.
    pub async fn get_conversation(&self, id: ConversationId) -> Result<Conversation, InquiryError> {
        let row = self
            .store
            .select(Query::table(CONVERSATIONS).filter(Filter::eq("id", id)).limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or(InquiryError::NotFound(id))?;
        Ok(from_record(row)?)
    }

    /// Every message of a conversation, oldest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    #[tracing::instrument(skip(self))]
    pub async fn get_messages(&self, id: ConversationId) -> Result<Vec<Message>, InquiryError> {
        let rows = self
            .store
            .select(
                Query::table(MESSAGES)
                    .filter(Filter::eq("conversation_id", id))
                    .order_by(Order::asc("created_at")),
            )
            .await?;
        Ok(from_records(rows)?)
    }

    /// Set the status; any status may follow any other.
    ///
    /// # Errors
    ///
    /// [`InquiryError::NotFound`] for an unknown id.
    #[tracing::instrument(skip(self))]
    pub async fn set_status(
        &self,
        id: ConversationId,
        status: ConversationStatus,
    ) -> Result<Conversation, InquiryError> {
        let rows = self
            .store
            .update(
                CONVERSATIONS,
                to_record(&StatusPatch { status })?,
                vec![Filter::eq("id", id)],
            )
            .await?;
        let row = rows.into_iter().next().ok_or(InquiryError::NotFound(id))?;
        tracing::info!(conversation_id = %id, %status, "Conversation status changed");
        Ok(from_record(row)?)
    }

    /// Delete a conversation and its messages in one batch.
    ///
    /// # Errors
    ///
    /// [`InquiryError::NotFound`] for an unknown id.
    #[tracing::instrument(skip(self))]
    pub async fn delete_conversation(&self, id: ConversationId) -> Result<(), InquiryError> {
        let outcome = self
            .store
            .transact(vec![
                Mutation::delete(MESSAGES, vec![Filter::eq("conversation_id", id)]),
                Mutation::delete(CONVERSATIONS, vec![Filter::eq("id", id)]),
            ])
            .await?;
        let deleted = outcome.get(1).is_some_and(|rows| !rows.is_empty());
        if !deleted {
            return Err(InquiryError::NotFound(id));
        }
        let messages = outcome.first().map_or(0, Vec::len);
        tracing::info!(conversation_id = %id, messages, "Conversation deleted");
        Ok(())
    }

    /// Create a booking from a conversation and resolve the conversation,
    /// both in one batch.
    ///
    /// # Errors
    ///
    /// - [`InquiryError::NotFound`] for an unknown conversation
    /// - [`InquiryError::Booking`] when the booking fields are invalid
    #[tracing::instrument(skip(self, draft))]
    pub async fn promote_to_booking(
        &self,
        id: ConversationId,
        draft: BookingDraft,
    ) -> Result<Booking, InquiryError> {
        let row = NewBooking::from_draft(draft, Some(id), self.clock.now())?;
        let batch = vec![
            Mutation::guarded_update(
                CONVERSATIONS,
                to_record(&StatusPatch {
                    status: ConversationStatus::Resolved,
                })?,
                vec![Filter::eq("id", id)],
            ),
            Mutation::insert(BOOKINGS, to_record(&row)?),
        ];

        let outcome = match self.store.transact(batch).await {
            Ok(outcome) => outcome,
            Err(RecordStoreError::PreconditionFailed { .. }) => return Err(InquiryError::NotFound(id)),
            Err(error) => return Err(error.into()),
        };
        let record = outcome
            .into_iter()
            .nth(1)
            .and_then(|rows| rows.into_iter().next())
            .ok_or_else(|| {
                RecordStoreError::DatabaseError("booking insert returned no row".into())
            })?;
        let booking: Booking = from_record(record)?;

        metrics::record_booking("promoted");
        tracing::info!(conversation_id = %id, booking_id = %booking.id, "Conversation promoted to booking");
        Ok(booking)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregates::booking::{BookingLifecycle, INITIAL_STATUS};
    use crate::testing::office_schema;
    use backline_testing::{InMemoryRecordStore, OnDelete, Schema, TableSchema, test_clock};
    use serde_json::json;

    fn participant(name: &str, kind: ParticipantType, venue: Option<&str>) -> Participant {
        Participant {
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            kind,
            venue_name: venue.map(str::to_string),
        }
    }

    fn conversation(participants: Vec<Participant>) -> Conversation {
        Conversation {
            id: ConversationId::new(),
            participants,
            status: ConversationStatus::Active,
            created_at: test_clock().now(),
        }
    }

    async fn seeded() -> (InMemoryRecordStore, InquiryService, ConversationId) {
        seeded_with(office_schema()).await
    }

    async fn seeded_with(schema: Schema) -> (InMemoryRecordStore, InquiryService, ConversationId) {
        let store = InMemoryRecordStore::new(schema);
        let service = InquiryService::new(Arc::new(store.clone()), Arc::new(test_clock()));
        let row = store
            .insert(
                CONVERSATIONS,
                to_record(&json!({
                    "participants": [{"name": "Sam", "email": "sam@venue.com", "type": "venue", "venue_name": "Hall"}],
                    "status": "active"
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        let id: ConversationId = serde_json::from_value(row["id"].clone()).unwrap();
        for content in ["Hi", "Are you free in June?"] {
            store
                .insert(
                    MESSAGES,
                    to_record(&json!({
                        "conversation_id": id,
                        "sender_type": "venue",
                        "sender_name": "Sam",
                        "content": content
                    }))
                    .unwrap(),
                )
                .await
                .unwrap();
        }
        (store, service, id)
    }

    #[test]
    fn primary_participant_prefers_venue() {
        let c = conversation(vec![
            participant("Agent", ParticipantType::Agent, None),
            participant("Sam", ParticipantType::Venue, Some("Hall")),
        ]);
        let draft = booking_draft(&c);
        assert_eq!(draft.contact_name, "Sam");
        assert_eq!(draft.venue_name, "Hall");
        assert_eq!(draft.event_time, NaiveTime::from_hms_opt(19, 0, 0));
        assert_eq!(draft.payment_amount, Some(Money::from_dollars(1500)));
    }

    #[test]
    fn primary_participant_falls_back_to_first_then_unknown() {
        let c = conversation(vec![participant("Alex", ParticipantType::Other, None)]);
        assert_eq!(booking_draft(&c).contact_name, "Alex");

        let empty = booking_draft(&conversation(Vec::new()));
        assert_eq!(empty.contact_name, UNKNOWN_PARTICIPANT);
        assert_eq!(empty.contact_email, UNKNOWN_PARTICIPANT);
    }

    #[test]
    fn unknown_participant_types_read_as_other() {
        let p: Participant =
            serde_json::from_value(json!({"name": "X", "email": "x@y.z", "type": "promoter"})).unwrap();
        assert_eq!(p.kind, ParticipantType::Other);
    }

    #[tokio::test]
    async fn filters_split_active_and_archived() {
        let (_, service, id) = seeded().await;
        assert_eq!(service.list_conversations(ConversationFilter::Active).await.unwrap().len(), 1);

        service.set_status(id, ConversationStatus::Archived).await.unwrap();
        assert!(service.list_conversations(ConversationFilter::Active).await.unwrap().is_empty());
        assert_eq!(service.list_conversations(ConversationFilter::Archived).await.unwrap().len(), 1);

        // Archived is not a dead end.
        let back = service.set_status(id, ConversationStatus::Active).await.unwrap();
        assert_eq!(back.status, ConversationStatus::Active);
    }

    #[tokio::test]
    async fn messages_come_back_in_order() {
        let (_, service, id) = seeded().await;
        let messages = service.get_messages(id).await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["Hi", "Are you free in June?"]);
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let (_, service, _) = seeded().await;
        let missing = ConversationId::new();
        assert_eq!(
            service.set_status(missing, ConversationStatus::Resolved).await,
            Err(InquiryError::NotFound(missing))
        );
        assert_eq!(
            service.delete_conversation(missing).await,
            Err(InquiryError::NotFound(missing))
        );
    }

    #[tokio::test]
    async fn delete_removes_messages_too() {
        let (store, service, id) = seeded().await;
        service.delete_conversation(id).await.unwrap();
        assert_eq!(store.count(CONVERSATIONS), 0);
        assert_eq!(store.count(MESSAGES), 0);
    }

    #[tokio::test]
    async fn promote_creates_booking_and_resolves_conversation() {
        let (store, service, id) = seeded().await;
        let conversation = service.get_conversation(id).await.unwrap();
        let booking = service.promote_to_booking(id, booking_draft(&conversation)).await.unwrap();

        assert_eq!(booking.state, BookingLifecycle::Inquiry);
        assert_eq!(booking.status, INITIAL_STATUS);
        assert_eq!(booking.conversation_id, Some(id));
        assert_eq!(
            service.get_conversation(id).await.unwrap().status,
            ConversationStatus::Resolved
        );
        assert_eq!(store.count(BOOKINGS), 1);
    }

    #[tokio::test]
    async fn promote_is_all_or_nothing() {
        let (store, service, id) = seeded().await;

        let mut invalid = booking_draft(&service.get_conversation(id).await.unwrap());
        invalid.contact_email = "nope".into();
        assert!(matches!(
            service.promote_to_booking(id, invalid).await,
            Err(InquiryError::Booking(BookingError::Validation(_)))
        ));

        let missing = ConversationId::new();
        let mut draft = booking_draft(&conversation(Vec::new()));
        draft.contact_email = "sam@venue.com".into();
        draft.venue_name = "Hall".into();
        assert_eq!(
            service.promote_to_booking(missing, draft).await,
            Err(InquiryError::NotFound(missing))
        );

        assert_eq!(store.count(BOOKINGS), 0);
        assert_eq!(
            service.get_conversation(id).await.unwrap().status,
            ConversationStatus::Active
        );
    }

    #[tokio::test]
    async fn promote_rolls_back_when_the_booking_insert_fails() {
        // One booking per conversation, so a second promote fails on the insert
        // after the status update has already been applied in the batch.
        let schema = Schema::new()
            .table(TableSchema::new(CONVERSATIONS))
            .table(TableSchema::new(MESSAGES).references("conversation_id", CONVERSATIONS, OnDelete::Cascade))
            .table(
                TableSchema::new(BOOKINGS)
                    .unique("conversation_id")
                    .references("conversation_id", CONVERSATIONS, OnDelete::SetNull),
            );
        let (store, service, id) = seeded_with(schema).await;
        store
            .insert(
                BOOKINGS,
                to_record(&json!({"conversation_id": id, "venue_name": "Hall", "state": "inquiry"})).unwrap(),
            )
            .await
            .unwrap();

        let draft = booking_draft(&service.get_conversation(id).await.unwrap());
        assert!(matches!(
            service.promote_to_booking(id, draft).await,
            Err(InquiryError::Store(RecordStoreError::UniqueViolation { .. }))
        ));

        assert_eq!(
            service.get_conversation(id).await.unwrap().status,
            ConversationStatus::Active
        );
        assert_eq!(store.count(BOOKINGS), 1);
    }
}
