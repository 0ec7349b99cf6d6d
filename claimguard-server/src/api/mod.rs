//! HTTP API handlers for claimguard-server

pub mod data;
pub mod embeddings;
pub mod features;
pub mod health;
pub mod stage2;
pub mod ui;

pub use data::data_routes;
pub use embeddings::embedding_routes;
pub use features::feature_routes;
pub use health::health_routes;
pub use stage2::stage2_routes;
pub use ui::ui_routes;
