//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into screen-level use-cases.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod analytics;
pub mod completion;
pub mod focus_controller;
pub mod session_plan;
