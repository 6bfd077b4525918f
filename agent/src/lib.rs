//! # Backline Chat Agent Client
//!
//! Client for the external booking chat agent. The agent answers venue
//! inquiries and turns band members' availability statements into
//! block-out records; this crate only carries messages to it.
//!
//! ## Example
//!
//! ```no_run
//! use backline_agent::{ChatAgent, ChatRequest, HttpChatAgent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let agent = HttpChatAgent::from_env()?;
//!     let reply = agent
//!         .send(ChatRequest::from_venue("Are you free June 1?", "Sam", "sam@venue.com"))
//!         .await?;
//!     println!("{}", reply.response);
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod client;
pub mod error;
pub mod mocks;
pub mod types;

// Re-export main types for convenience
pub use client::HttpChatAgent;
pub use error::AgentError;
pub use types::{ChatReply, ChatRequest, SenderType};

/// Boxed future returned by [`ChatAgent::send`]
pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<ChatReply, AgentError>> + Send + 'a>>;

/// Anything that can answer a chat message
///
/// Dyn-compatible so services can hold an `Arc<dyn ChatAgent>`.
pub trait ChatAgent: Send + Sync {
    /// Send one message and wait for the reply
    ///
    /// # Errors
    ///
    /// Any [`AgentError`]; callers decide whether to surface or substitute it.
    fn send(&self, request: ChatRequest) -> ChatFuture<'_>;
}
