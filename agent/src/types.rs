//! Wire types for `POST /api/v1/chat`

use serde::{Deserialize, Serialize};

/// Who is speaking to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    /// A venue or promoter using the public inquiry chat
    Venue,
    /// A band member reporting availability
    BandMember,
}

/// A message forwarded to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Free-text message
    pub message: String,
    /// Conversation to continue; `None` starts a new one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Display name of the sender
    pub sender_name: String,
    /// Email of the sender
    pub sender_email: String,
    /// Kind of sender
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_type: Option<SenderType>,
    /// Venue the sender represents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_name: Option<String>,
    /// Band member the message is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub band_member_id: Option<String>,
}

impl ChatRequest {
    /// Message from a venue in the public chat.
    pub fn from_venue(
        message: impl Into<String>,
        sender_name: impl Into<String>,
        sender_email: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
            sender_name: sender_name.into(),
            sender_email: sender_email.into(),
            sender_type: Some(SenderType::Venue),
            venue_name: None,
            band_member_id: None,
        }
    }

    /// Availability statement from a band member.
    pub fn from_band_member(
        message: impl Into<String>,
        band_member_id: impl Into<String>,
        sender_name: impl Into<String>,
        sender_email: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
            sender_name: sender_name.into(),
            sender_email: sender_email.into(),
            sender_type: None,
            venue_name: None,
            band_member_id: Some(band_member_id.into()),
        }
    }

    /// Continue an existing conversation.
    #[must_use]
    pub fn in_conversation(mut self, conversation_id: Option<String>) -> Self {
        self.conversation_id = conversation_id;
        self
    }

    /// Attach the venue name.
    #[must_use]
    pub fn with_venue(mut self, venue_name: Option<String>) -> Self {
        self.venue_name = venue_name;
        self
    }
}

/// The agent's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// Conversation the message was filed under
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Text to show the sender
    pub response: String,
}
