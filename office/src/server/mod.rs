//! HTTP server for the back-office.
//!
//! - Application state ([`AppState`])
//! - Admin session extraction ([`AdminSession`])
//! - Router configuration ([`build_router`])

pub mod routes;
pub mod session;
pub mod state;

pub use routes::build_router;
pub use session::AdminSession;
pub use state::AppState;
