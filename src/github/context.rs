use std::sync::Arc;

use log::info;

use crate::github::app::{App, OAuthCredentials};
use crate::github::handlers;
use crate::github::webhooks::Webhooks;
use crate::utils::config::{self, GitHubAppConfig};
use crate::utils::logging::{EventLog, LogSink};

/// The initialized integration, built once at startup and shared read-only.
/// Both handles are absent when the configuration was incomplete.
#[derive(Debug, Default)]
pub struct GitHubContext {
    app: Option<App>,
    webhooks: Option<Webhooks>,
}

impl GitHubContext {
    pub fn uninitialized() -> Self {
        GitHubContext::default()
    }

    /// Builds the App client and the webhook dispatcher from a complete
    /// configuration and registers the logging handlers.
    pub fn from_config(config: GitHubAppConfig, sink: Arc<dyn EventLog>) -> Self {
        let app = App::new(
            config.app_id,
            config.private_key,
            OAuthCredentials {
                client_id: config.client_id,
                client_secret: config.client_secret,
                redirect_uri: config.redirect_uri,
            },
        );

        let mut webhooks = Webhooks::new(config.webhook_secret);
        handlers::register(&mut webhooks, sink);

        info!("GitHub App {} initialized", app.app_id());
        GitHubContext {
            app: Some(app),
            webhooks: Some(webhooks),
        }
    }

    /// Initializes from the process environment, logging through `log`.
    pub async fn initialize() -> Self {
        Self::initialize_with(config::env_lookup, Arc::new(LogSink)).await
    }

    /// Initializes from `lookup`. Missing configuration leaves the context
    /// uninitialized without raising an error.
    pub async fn initialize_with<F>(lookup: F, sink: Arc<dyn EventLog>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match GitHubAppConfig::load(lookup).await {
            Some(config) => Self::from_config(config, sink),
            None => Self::uninitialized(),
        }
    }

    pub fn app(&self) -> Option<&App> {
        self.app.as_ref()
    }

    pub fn webhooks(&self) -> Option<&Webhooks> {
        self.webhooks.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.app.is_some() && self.webhooks.is_some()
    }
}
