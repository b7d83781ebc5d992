use std::process;
use log::info;

use github_webhook_service::routes;
use github_webhook_service::utils::logging;
use github_webhook_service::GitHubContext;

#[rocket::launch]
async fn rocket() -> _ {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    if let Err(err) = logging::init_production_logger() {
        eprintln!("Failed to initialize logger: {}", err);
        process::exit(1);
    }
    info!("Starting GitHub webhook service...");

    let ctx = GitHubContext::initialize().await;
    if !ctx.is_initialized() {
        info!("GitHub App not configured, webhook deliveries will be refused");
    }

    info!("Configuring Rocket server...");
    routes::build(ctx)
}
