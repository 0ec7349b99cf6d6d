//! # ClaimGuard Common Library
//!
//! Shared code for the ClaimGuard server and agent:
//! - Error taxonomy
//! - Root folder and TOML configuration
//! - Claim, chunk and analysis data model

pub mod config;
pub mod error;
pub mod models;

pub use config::{PipelineConfig, PipelinePaths, RetrievalSettings, ScoringSettings};
pub use error::{Error, Result};
