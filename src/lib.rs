pub mod api;
pub mod error;
pub mod github;
pub mod models;
pub mod utils;

// Re-export commonly used modules
pub use crate::api::routes;
pub use crate::github::{App, GitHubContext, Webhooks};
pub use crate::models::webhook;
pub use crate::utils::{config, logging};
