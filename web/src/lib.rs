//! Axum integration for Backline.
//!
//! This crate is the imperative shell shared by Backline services: it turns
//! library errors into HTTP responses, tags every request with a correlation
//! id and extracts bearer tokens. Domain routes live in the application crate.
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives; [`correlation_id_layer`] opens a tracing span
//! 2. **Extract** JSON, path and [`BearerToken`]
//! 3. **Call** the domain service (or dispatch an action through a `Store`)
//! 4. **Map** the result, converting domain errors into [`AppError`]
//!
//! # Example
//!
//! ```ignore
//! use backline_web::{AppError, correlation_id_layer, handlers::health_check};
//! use axum::{Router, routing::get};
//!
//! let app = Router::new()
//!     .route("/health", get(health_check))
//!     .layer(correlation_id_layer());
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::{AppError, ErrorResponse};
pub use extractors::BearerToken;
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
