pub mod app;
pub mod context;
pub mod handlers;
pub mod webhooks;

pub use app::App;
pub use context::GitHubContext;
pub use webhooks::Webhooks;
