//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate units of work and cache refreshes into use-case level APIs.
//! - Keep callers decoupled from storage details.

pub mod update_service;
