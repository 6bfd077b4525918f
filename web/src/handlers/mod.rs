//! HTTP request handlers shared by every Backline service.

pub mod health;

pub use health::{HealthResponse, health_check, readiness_check};
