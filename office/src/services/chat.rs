//! Public inquiry chat relay.
//!
//! Venues talk to the booking agent through this service. The relay never
//! fails: when the agent is unreachable the venue gets an apology that points
//! at the band's direct contacts.

use crate::config::BandConfig;
use crate::metrics;
use backline_agent::{ChatAgent, ChatReply, ChatRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A message typed into the public chat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueMessage {
    /// Message text
    pub message: String,
    /// Conversation to continue
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Sender name
    pub sender_name: String,
    /// Sender email
    pub sender_email: String,
    /// Venue the sender represents
    #[serde(default)]
    pub venue_name: Option<String>,
}

/// Forwards venue messages to the chat agent.
#[derive(Clone)]
pub struct ChatRelay {
    agent: Arc<dyn ChatAgent>,
    band: BandConfig,
}

impl ChatRelay {
    /// Creates a new `ChatRelay`
    #[must_use]
    pub fn new(agent: Arc<dyn ChatAgent>, band: BandConfig) -> Self {
        Self { agent, band }
    }

    /// Apology shown when the agent cannot answer.
    #[must_use]
    pub fn fallback_message(&self) -> String {
        format!(
            "Sorry, I'm having trouble connecting right now. Please email us directly at {} or contact our booking manager {}",
            self.band.contact_email, self.band.booking_manager
        )
    }

    /// Relay one message and return the agent's answer, or the fallback.
    #[tracing::instrument(skip(self, message), fields(conversation_id = ?message.conversation_id))]
    pub async fn relay(&self, message: VenueMessage) -> ChatReply {
        let conversation_id = message.conversation_id.clone();
        let request = ChatRequest::from_venue(message.message, message.sender_name, message.sender_email)
            .in_conversation(message.conversation_id)
            .with_venue(message.venue_name);

        match self.agent.send(request).await {
            Ok(reply) => reply,
            Err(error) => {
                metrics::record_agent_fallback("relay");
                tracing::warn!(%error, "Chat agent unavailable, sending fallback");
                ChatReply {
                    conversation_id,
                    response: self.fallback_message(),
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backline_agent::mocks::ScriptedAgent;
    use backline_agent::{AgentError, SenderType};

    fn message(conversation_id: Option<&str>) -> VenueMessage {
        VenueMessage {
            message: "Are you free June 1?".into(),
            conversation_id: conversation_id.map(str::to_string),
            sender_name: "Sam".into(),
            sender_email: "sam@hall.org".into(),
            venue_name: Some("The Hall".into()),
        }
    }

    #[tokio::test]
    async fn relays_venue_messages() {
        let agent = ScriptedAgent::new().reply(Some("c-1"), "We are!");
        let relay = ChatRelay::new(Arc::new(agent.clone()), BandConfig::default());

        let reply = relay.relay(message(None)).await;
        assert_eq!(reply.conversation_id.as_deref(), Some("c-1"));
        assert_eq!(reply.response, "We are!");

        let sent = &agent.requests()[0];
        assert_eq!(sent.sender_type, Some(SenderType::Venue));
        assert_eq!(sent.venue_name.as_deref(), Some("The Hall"));
        assert_eq!(sent.conversation_id, None);
    }

    #[tokio::test]
    async fn agent_failure_becomes_the_fallback() {
        let agent = ScriptedAgent::new().fail(AgentError::ApiError {
            status: 503,
            message: "down".into(),
        });
        let band = BandConfig {
            name: "The Band".into(),
            contact_email: "hi@band.com".into(),
            booking_manager: "Kim at kim@band.com".into(),
        };
        let relay = ChatRelay::new(Arc::new(agent), band);

        let reply = relay.relay(message(Some("c-9"))).await;
        assert_eq!(reply.conversation_id.as_deref(), Some("c-9"));
        assert_eq!(
            reply.response,
            "Sorry, I'm having trouble connecting right now. Please email us directly at hi@band.com or contact our booking manager Kim at kim@band.com"
        );
    }
}
