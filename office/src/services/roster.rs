//! Band members and their availability block-outs.

use crate::metrics;
use crate::types::{AvailabilityId, BandMemberId};
use backline_agent::{AgentError, ChatAgent, ChatRequest};
use backline_core::record_store::{
    Filter, Order, Query, RecordStore, RecordStoreError, from_record, from_records, to_record,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Record store table holding band members.
pub const BAND_MEMBERS: &str = "band_members";
/// Record store table holding availability block-outs.
pub const AVAILABILITY: &str = "availability";
/// The only availability status written.
pub const UNAVAILABLE: &str = "unavailable";

/// Failure of a roster operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// No such record.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// Input rejected.
    #[error("{0}")]
    Validation(String),

    /// The chat agent could not be reached or answered with an error.
    #[error("Error contacting agent.")]
    AgentUnavailable(#[source] AgentError),

    /// Record store failure.
    #[error(transparent)]
    Store(#[from] RecordStoreError),
}

impl RosterError {
    fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// A member of the band.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandMember {
    /// Member id
    pub id: BandMemberId,
    /// Display name
    pub name: String,
    /// Email
    #[serde(default)]
    pub email: String,
    /// Instrument played
    #[serde(default)]
    pub instrument: Option<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Editable band member fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandMemberDraft {
    /// Display name (required)
    pub name: String,
    /// Email (required)
    pub email: String,
    /// Instrument played
    pub instrument: Option<String>,
}

impl BandMemberDraft {
    fn validated(self) -> Result<Self, RosterError> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() {
            return Err(RosterError::Validation("Name and email are required.".into()));
        }
        Ok(self)
    }
}

/// A date range during which a member cannot play.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// Block-out id
    pub id: AvailabilityId,
    /// Member this applies to, when known
    #[serde(default)]
    pub band_member_id: Option<BandMemberId>,
    /// First unavailable day
    pub date_range_start: NaiveDate,
    /// Last unavailable day
    pub date_range_end: NaiveDate,
    /// Always `unavailable`
    pub status: String,
    /// Notes
    #[serde(default)]
    pub notes: String,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Availability form input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityDraft {
    /// Member this applies to (ignored on edit)
    pub band_member_id: Option<BandMemberId>,
    /// First unavailable day
    pub date_range_start: Option<NaiveDate>,
    /// Last unavailable day
    pub date_range_end: Option<NaiveDate>,
    /// Notes
    pub notes: String,
}

#[derive(Serialize)]
struct AvailabilityPatch {
    date_range_start: NaiveDate,
    date_range_end: NaiveDate,
    status: &'static str,
    notes: String,
}

#[derive(Serialize)]
struct NewAvailability {
    band_member_id: Option<BandMemberId>,
    #[serde(flatten)]
    patch: AvailabilityPatch,
}

impl AvailabilityDraft {
    fn patch(self) -> Result<(Option<BandMemberId>, AvailabilityPatch), RosterError> {
        let (Some(start), Some(end)) = (self.date_range_start, self.date_range_end) else {
            return Err(RosterError::Validation("Please select a start and end date.".into()));
        };
        if start > end {
            return Err(RosterError::Validation(
                "The start date must not be after the end date.".into(),
            ));
        }
        Ok((
            self.band_member_id,
            AvailabilityPatch {
                date_range_start: start,
                date_range_end: end,
                status: UNAVAILABLE,
                notes: self.notes,
            },
        ))
    }
}

/// What a band member sees after reporting availability in chat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    /// The agent's answer
    pub reply: String,
    /// Availability after the agent has acted
    pub availability: Vec<Availability>,
}

/// Band members, availability, and the availability chat.
#[derive(Clone)]
pub struct RosterService {
    store: Arc<dyn RecordStore>,
    agent: Arc<dyn ChatAgent>,
}

impl RosterService {
    /// Creates a new `RosterService`
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, agent: Arc<dyn ChatAgent>) -> Self {
        Self { store, agent }
    }

    /// Band members, oldest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn list_members(&self) -> Result<Vec<BandMember>, RosterError> {
        let rows = self
            .store
            .select(Query::table(BAND_MEMBERS).order_by(Order::asc("created_at")))
            .await?;
        Ok(from_records(rows)?)
    }

    /// One band member.
    ///
    /// # Errors
    ///
    /// [`RosterError::NotFound`] for an unknown id.
    pub async fn get_member(&self, id: BandMemberId) -> Result<BandMember, RosterError> {
        let row = self
            .store
            .select(Query::table(BAND_MEMBERS).filter(Filter::eq("id", id)).limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RosterError::not_found("Band member", id))?;
        Ok(from_record(row)?)
    }

    /// Add a band member.
    ///
    /// # Errors
    ///
    /// [`RosterError::Validation`] when the name or email is blank.
    #[tracing::instrument(skip(self, draft))]
    pub async fn create_member(&self, draft: BandMemberDraft) -> Result<BandMember, RosterError> {
        let row = self
            .store
            .insert(BAND_MEMBERS, to_record(&draft.validated()?)?)
            .await?;
        let member: BandMember = from_record(row)?;
        tracing::info!(member_id = %member.id, "Band member added");
        Ok(member)
    }

    /// Replace a band member's fields.
    ///
    /// # Errors
    ///
    /// [`RosterError::Validation`] or [`RosterError::NotFound`].
    #[tracing::instrument(skip(self, draft))]
    pub async fn update_member(
        &self,
        id: BandMemberId,
        draft: BandMemberDraft,
    ) -> Result<BandMember, RosterError> {
        let row = self
            .store
            .update(BAND_MEMBERS, to_record(&draft.validated()?)?, vec![Filter::eq("id", id)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RosterError::not_found("Band member", id))?;
        tracing::info!(member_id = %id, "Band member updated");
        Ok(from_record(row)?)
    }

    /// Remove a band member together with their availability.
    ///
    /// # Errors
    ///
    /// [`RosterError::NotFound`] for an unknown id.
    #[tracing::instrument(skip(self))]
    pub async fn delete_member(&self, id: BandMemberId) -> Result<(), RosterError> {
        let rows = self.store.delete(BAND_MEMBERS, vec![Filter::eq("id", id)]).await?;
        if rows.is_empty() {
            return Err(RosterError::not_found("Band member", id));
        }
        tracing::info!(member_id = %id, "Band member removed");
        Ok(())
    }

    /// Every block-out, earliest start first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn list_availability(&self) -> Result<Vec<Availability>, RosterError> {
        let rows = self
            .store
            .select(
                Query::table(AVAILABILITY)
                    .order_by(Order::asc("date_range_start"))
                    .order_by(Order::asc("created_at")),
            )
            .await?;
        Ok(from_records(rows)?)
    }

    /// Record a block-out.
    ///
    /// # Errors
    ///
    /// - [`RosterError::Validation`] for a missing or inverted date range
    /// - [`RosterError::Store`] with a foreign key violation for an unknown member
    #[tracing::instrument(skip(self, draft))]
    pub async fn add_availability(&self, draft: AvailabilityDraft) -> Result<Availability, RosterError> {
        let (band_member_id, patch) = draft.patch()?;
        let row = self
            .store
            .insert(AVAILABILITY, to_record(&NewAvailability { band_member_id, patch })?)
            .await?;
        let availability: Availability = from_record(row)?;
        tracing::info!(availability_id = %availability.id, "Availability added");
        Ok(availability)
    }

    /// Change a block-out's dates and notes; the member is kept.
    ///
    /// # Errors
    ///
    /// [`RosterError::Validation`] or [`RosterError::NotFound`].
    #[tracing::instrument(skip(self, draft))]
    pub async fn edit_availability(
        &self,
        id: AvailabilityId,
        draft: AvailabilityDraft,
    ) -> Result<Availability, RosterError> {
        let (_, patch) = draft.patch()?;
        let row = self
            .store
            .update(AVAILABILITY, to_record(&patch)?, vec![Filter::eq("id", id)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RosterError::not_found("Availability", id))?;
        Ok(from_record(row)?)
    }

    /// Remove a block-out.
    ///
    /// # Errors
    ///
    /// [`RosterError::NotFound`] for an unknown id.
    pub async fn delete_availability(&self, id: AvailabilityId) -> Result<(), RosterError> {
        let rows = self.store.delete(AVAILABILITY, vec![Filter::eq("id", id)]).await?;
        if rows.is_empty() {
            return Err(RosterError::not_found("Availability", id));
        }
        Ok(())
    }

    /// Pass a member's availability statement to the chat agent, which
    /// records block-outs itself, then return the refreshed list.
    ///
    /// # Errors
    ///
    /// - [`RosterError::NotFound`] for an unknown member
    /// - [`RosterError::Validation`] for a blank message
    /// - [`RosterError::AgentUnavailable`] when the agent fails
    #[tracing::instrument(skip(self, message))]
    pub async fn report_availability(
        &self,
        member_id: BandMemberId,
        message: &str,
    ) -> Result<AvailabilityReport, RosterError> {
        if message.trim().is_empty() {
            return Err(RosterError::Validation("Message must not be empty.".into()));
        }
        let member = self.get_member(member_id).await?;
        let request =
            ChatRequest::from_band_member(message, member.id.to_string(), member.name, member.email);

        let reply = match self.agent.send(request).await {
            Ok(reply) => reply,
            Err(error) => {
                metrics::record_agent_fallback("roster");
                tracing::warn!(%member_id, %error, "Availability chat failed");
                return Err(RosterError::AgentUnavailable(error));
            },
        };

        Ok(AvailabilityReport {
            reply: reply.response,
            availability: self.list_availability().await?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::office_schema;
    use backline_agent::mocks::ScriptedAgent;
    use backline_agent::SenderType;
    use backline_testing::InMemoryRecordStore;

    fn roster(agent: ScriptedAgent) -> (InMemoryRecordStore, RosterService) {
        let store = InMemoryRecordStore::new(office_schema());
        let service = RosterService::new(Arc::new(store.clone()), Arc::new(agent));
        (store, service)
    }

    fn member(name: &str) -> BandMemberDraft {
        BandMemberDraft {
            name: name.into(),
            email: format!("{}@band.com", name.to_lowercase()),
            instrument: Some("drums".into()),
        }
    }

    fn day(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 6, d)
    }

    #[tokio::test]
    async fn members_need_name_and_email() {
        let (_, roster) = roster(ScriptedAgent::new());
        let result = roster
            .create_member(BandMemberDraft {
                name: "Al".into(),
                ..BandMemberDraft::default()
            })
            .await;
        assert_eq!(result, Err(RosterError::Validation("Name and email are required.".into())));
    }

    #[tokio::test]
    async fn members_list_oldest_first() {
        let (_, roster) = roster(ScriptedAgent::new());
        roster.create_member(member("Al")).await.unwrap();
        roster.create_member(member("Bo")).await.unwrap();
        let names: Vec<_> = roster.list_members().await.unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(names, ["Al", "Bo"]);
    }

    #[tokio::test]
    async fn availability_requires_an_ordered_range() {
        let (_, roster) = roster(ScriptedAgent::new());
        let missing = roster
            .add_availability(AvailabilityDraft {
                date_range_start: day(1),
                ..AvailabilityDraft::default()
            })
            .await;
        assert_eq!(
            missing,
            Err(RosterError::Validation("Please select a start and end date.".into()))
        );

        let inverted = roster
            .add_availability(AvailabilityDraft {
                date_range_start: day(9),
                date_range_end: day(2),
                ..AvailabilityDraft::default()
            })
            .await;
        assert!(matches!(inverted, Err(RosterError::Validation(_))));
    }

    #[tokio::test]
    async fn edit_keeps_member_and_forces_unavailable() {
        let (_, roster) = roster(ScriptedAgent::new());
        let al = roster.create_member(member("Al")).await.unwrap();
        let block = roster
            .add_availability(AvailabilityDraft {
                band_member_id: Some(al.id),
                date_range_start: day(1),
                date_range_end: day(3),
                notes: "wedding".into(),
            })
            .await
            .unwrap();
        assert_eq!(block.status, UNAVAILABLE);

        let edited = roster
            .edit_availability(
                block.id,
                AvailabilityDraft {
                    date_range_start: day(2),
                    date_range_end: day(4),
                    ..AvailabilityDraft::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.band_member_id, Some(al.id));
        assert_eq!(edited.date_range_end, day(4).unwrap());
        assert!(edited.notes.is_empty());
    }

    #[tokio::test]
    async fn deleting_a_member_removes_their_availability() {
        let (store, roster) = roster(ScriptedAgent::new());
        let al = roster.create_member(member("Al")).await.unwrap();
        roster
            .add_availability(AvailabilityDraft {
                band_member_id: Some(al.id),
                date_range_start: day(1),
                date_range_end: day(1),
                ..AvailabilityDraft::default()
            })
            .await
            .unwrap();

        roster.delete_member(al.id).await.unwrap();
        assert_eq!(store.count(AVAILABILITY), 0);
        assert!(matches!(
            roster.delete_member(al.id).await,
            Err(RosterError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn report_sends_member_identity_and_refreshes() {
        let agent = ScriptedAgent::new().reply(None, "Got it, June 1 blocked.");
        let (_, roster) = roster(agent.clone());
        let al = roster.create_member(member("Al")).await.unwrap();

        let report = roster.report_availability(al.id, "I'm out June 1").await.unwrap();
        assert_eq!(report.reply, "Got it, June 1 blocked.");
        assert!(report.availability.is_empty());

        let sent = agent.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].band_member_id, Some(al.id.to_string()));
        assert_eq!(sent[0].sender_email, "al@band.com");
        assert_ne!(sent[0].sender_type, Some(SenderType::Venue));
    }

    #[tokio::test]
    async fn agent_failure_is_reported() {
        let agent = ScriptedAgent::new().fail(AgentError::Timeout);
        let (_, roster) = roster(agent);
        let al = roster.create_member(member("Al")).await.unwrap();

        let error = roster.report_availability(al.id, "out all July").await.unwrap_err();
        assert_eq!(error, RosterError::AgentUnavailable(AgentError::Timeout));
        assert_eq!(error.to_string(), "Error contacting agent.");
    }
}
