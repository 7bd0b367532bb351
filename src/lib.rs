pub mod audit;
pub mod client;
pub mod config;
pub mod error;
pub mod export;

pub use client::AuditClient;
pub use config::AppConfig;
pub use error::{AnchorError, Result};
