//! Shared types, errors, and configuration for RagVault.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references (tenant, user, document)
//! - The role hierarchy and the verified identity produced by token checks
//! - Pagination types for list endpoints
//! - Application-wide error types
//! - Configuration management

pub mod auth;
pub mod config;
pub mod error;
pub mod types;

pub use auth::{Role, VerifiedToken};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
