//! Test Helper Utilities
//!
//! Shared utilities for testing embrya-ai
#![allow(dead_code)]

pub mod image_generator;
pub mod model_fixtures;

pub use image_generator::{
    brightfield_disc_png, disc_png, inset_checkerboard_png, uniform_gray_png,
};
pub use model_fixtures::{
    analyzer_with, constant_logistic, registry_from_dir, write_model, FailingAuditSink,
};
