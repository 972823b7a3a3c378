//! HTTP API handlers for embrya-ai
//!
//! Thin JSON surface over the pipeline. Authentication and persistence live
//! outside this service.

pub mod audit;
pub mod health;
pub mod predict;

pub use audit::audit_routes;
pub use health::health_routes;
pub use predict::predict_routes;
