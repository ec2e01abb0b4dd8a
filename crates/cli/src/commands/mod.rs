//! Command handlers for the Samarth CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod audit;
pub mod cache;
pub mod health;
pub mod templates;

pub use ask::AskCommand;
pub use audit::AuditCommand;
pub use cache::CacheCommand;
pub use health::HealthCommand;
pub use templates::TemplatesCommand;
