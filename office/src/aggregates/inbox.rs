//! Inbox view model: the fetched conversation list, the active filter, the
//! selected conversation and its messages.
//!
//! Every fetch is an effect against [`InquiryService`]; results come back as
//! events. A refresh selects the first conversation when nothing is selected.

use crate::services::inquiries::{
    Conversation, ConversationFilter, ConversationStatus, InquiryError, InquiryService, Message,
};
use crate::types::ConversationId;
use backline_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use serde::Serialize;

/// Actions for the inbox
#[derive(Clone, Debug, PartialEq)]
pub enum InboxAction {
    // Commands
    /// Re-fetch the list for the current filter
    Refresh,
    /// Switch filter; clears the selection and re-fetches
    SetFilter {
        /// New filter
        filter: ConversationFilter,
    },
    /// Select a conversation and fetch its messages
    Select {
        /// Conversation to open
        id: ConversationId,
    },
    /// Change a conversation's status
    SetStatus {
        /// Target conversation
        id: ConversationId,
        /// New status
        status: ConversationStatus,
    },
    /// Hard-delete a conversation
    Delete {
        /// Target conversation
        id: ConversationId,
    },

    // Events
    /// List fetched
    Loaded {
        /// Conversations, newest first
        conversations: Vec<Conversation>,
    },
    /// Messages fetched
    MessagesLoaded {
        /// Conversation they belong to
        id: ConversationId,
        /// Messages, oldest first
        messages: Vec<Message>,
    },
    /// Status written
    StatusChanged {
        /// Conversation as stored
        conversation: Conversation,
    },
    /// Conversation deleted
    Deleted {
        /// Deleted conversation
        id: ConversationId,
    },
    /// A fetch or write failed
    Failed {
        /// Reason
        error: InquiryError,
    },
}

/// Inbox state.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InboxState {
    /// Active filter
    pub filter: ConversationFilter,
    /// Fetched conversations
    pub conversations: Vec<Conversation>,
    /// Selected conversation
    pub selected: Option<ConversationId>,
    /// Messages of the selected conversation
    pub messages: Vec<Message>,
    /// A list fetch is in flight
    #[serde(skip)]
    pub loading: bool,
    /// Last failure
    #[serde(skip)]
    pub last_error: Option<InquiryError>,
}

impl InboxState {
    /// Empty inbox showing `filter`.
    #[must_use]
    pub fn with_filter(filter: ConversationFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

/// Environment for the inbox reducer
#[derive(Clone)]
pub struct InboxEnvironment {
    /// Conversation reads and writes
    pub inquiries: InquiryService,
}

/// Reducer for the inbox view model
#[derive(Clone, Debug, Default)]
pub struct InboxReducer;

impl InboxReducer {
    /// Creates a new `InboxReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn fetch_list(env: &InboxEnvironment, filter: ConversationFilter) -> Effect<InboxAction> {
        let inquiries = env.inquiries.clone();
        Effect::future(async move {
            Some(match inquiries.list_conversations(filter).await {
                Ok(conversations) => InboxAction::Loaded { conversations },
                Err(error) => InboxAction::Failed { error },
            })
        })
    }

    fn fetch_messages(env: &InboxEnvironment, id: ConversationId) -> Effect<InboxAction> {
        let inquiries = env.inquiries.clone();
        Effect::future(async move {
            Some(match inquiries.get_messages(id).await {
                Ok(messages) => InboxAction::MessagesLoaded { id, messages },
                Err(error) => InboxAction::Failed { error },
            })
        })
    }
}

impl Reducer for InboxReducer {
    type State = InboxState;
    type Action = InboxAction;
    type Environment = InboxEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            InboxAction::Refresh => {
                state.loading = true;
                smallvec![Self::fetch_list(env, state.filter)]
            },
            InboxAction::SetFilter { filter } => {
                state.filter = filter;
                state.selected = None;
                state.messages.clear();
                state.loading = true;
                smallvec![Self::fetch_list(env, filter)]
            },
            InboxAction::Select { id } => {
                state.selected = Some(id);
                state.messages.clear();
                smallvec![Self::fetch_messages(env, id)]
            },
            InboxAction::SetStatus { id, status } => {
                let inquiries = env.inquiries.clone();
                smallvec![Effect::future(async move {
                    Some(match inquiries.set_status(id, status).await {
                        Ok(conversation) => InboxAction::StatusChanged { conversation },
                        Err(error) => InboxAction::Failed { error },
                    })
                })]
            },
            InboxAction::Delete { id } => {
                let inquiries = env.inquiries.clone();
                smallvec![Effect::future(async move {
                    Some(match inquiries.delete_conversation(id).await {
                        Ok(()) => InboxAction::Deleted { id },
                        Err(error) => InboxAction::Failed { error },
                    })
                })]
            },

            InboxAction::Loaded { conversations } => {
                state.loading = false;
                state.last_error = None;
                state.conversations = conversations;
                if state.selected.is_none() {
                    if let Some(first) = state.conversations.first() {
                        let id = first.id;
                        state.selected = Some(id);
                        return smallvec![Self::fetch_messages(env, id)];
                    }
                }
                SmallVec::new()
            },
            InboxAction::MessagesLoaded { id, messages } => {
                // Drop responses for a conversation that is no longer selected.
                if state.selected == Some(id) {
                    state.messages = messages;
                }
                SmallVec::new()
            },
            InboxAction::StatusChanged { conversation } => {
                if let Some(row) = state.conversations.iter_mut().find(|c| c.id == conversation.id) {
                    *row = conversation;
                }
                SmallVec::new()
            },
            InboxAction::Deleted { id } => {
                state.conversations.retain(|c| c.id != id);
                if state.selected == Some(id) {
                    state.selected = None;
                    state.messages.clear();
                }
                SmallVec::new()
            },
            InboxAction::Failed { error } => {
                tracing::warn!(%error, "Inbox operation failed");
                state.loading = false;
                state.last_error = Some(error);
                SmallVec::new()
            },
        }
    }
}
