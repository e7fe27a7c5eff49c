//! Service layer for the lobby relay
//!
//! Component wiring, lifecycle management, and health reporting.

pub mod app;
pub mod health;

pub use app::{RelayService, ServiceError};
pub use health::{HealthCheck, HealthStatus, ServiceStats};
