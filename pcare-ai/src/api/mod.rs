//! HTTP API handlers for pcare-ai
//!
//! JSON over HTTP; long-running work is polled through GET /sessions/:id.

pub mod health;
pub mod plants;
pub mod sessions;

pub use health::health_routes;
pub use plants::plant_routes;
pub use sessions::session_routes;
