//! # Embrya Common Library
//!
//! Shared code for the Embrya services including:
//! - Common error type
//! - Configuration loading (TOML file resolution with graceful defaults)
//! - Audit event model and the `AuditSink` capability

pub mod audit;
pub mod config;
pub mod error;

pub use audit::{AuditAction, AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use error::{Error, Result};
