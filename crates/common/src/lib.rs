//! LabTrack Common Library
//!
//! Shared code for the LabTrack gateway and CLI including:
//! - Schema-per-center tenancy (resolution, scoped execution, provisioning)
//! - Database models, shared-schema repository and table creation
//! - The per-center sample registry
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Request validation
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod registry;
pub mod tenancy;
pub mod validation;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use registry::SampleRegistry;
pub use tenancy::{RequestScope, TenantContext, TenantScope};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
