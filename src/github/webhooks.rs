use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use log::{debug, warn};
use tokio::task::JoinSet;

use crate::error::WebhookError;
use crate::models::webhook::{HandlerKey, WebhookEvent};
use crate::utils::hmac::{sign_payload, verify_signature};

pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
pub type Handler = Arc<dyn Fn(WebhookEvent) -> HandlerFuture + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&WebhookError) + Send + Sync>;

/// Verifies deliveries against the shared secret and routes them to the
/// handlers registered for the event name, for `name.action` and to every
/// catch-all handler. Failures of a delivery are reported once through the
/// error hooks.
pub struct Webhooks {
    secret: String,
    handlers: HashMap<HandlerKey, Vec<Handler>>,
    any_handlers: Vec<Handler>,
    error_hooks: Vec<ErrorHook>,
}

fn boxed<F, Fut>(handler: F) -> Handler
where
    F: Fn(WebhookEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |event| Box::pin(handler(event)) as HandlerFuture)
}

impl Webhooks {
    pub fn new(secret: impl Into<String>) -> Self {
        Webhooks {
            secret: secret.into(),
            handlers: HashMap::new(),
            any_handlers: Vec::new(),
            error_hooks: Vec::new(),
        }
    }

    /// Registers a handler for `name` or `name.action`.
    pub fn on<F, Fut>(&mut self, key: &str, handler: F)
    where
        F: Fn(WebhookEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.handlers
            .entry(HandlerKey::from(key))
            .or_default()
            .push(boxed(handler));
    }

    /// Registers a handler that runs for every event.
    pub fn on_any<F, Fut>(&mut self, handler: F)
    where
        F: Fn(WebhookEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.any_handlers.push(boxed(handler));
    }

    /// Registers a hook called once per failed delivery.
    pub fn on_error<F>(&mut self, hook: F)
    where
        F: Fn(&WebhookError) + Send + Sync + 'static,
    {
        self.error_hooks.push(Arc::new(hook));
    }

    pub fn sign(&self, payload: &[u8]) -> String {
        sign_payload(payload, &self.secret)
    }

    pub fn verify(&self, payload: &[u8], signature: &str) -> Result<(), WebhookError> {
        verify_signature(payload, signature, &self.secret)
    }

    fn matching_handlers(&self, event: &WebhookEvent) -> Vec<Handler> {
        let key = event.key();
        let by_name = HandlerKey::new(event.name.clone(), None);

        let mut matched: Vec<Handler> = Vec::new();
        if let Some(handlers) = self.handlers.get(&by_name) {
            matched.extend(handlers.iter().cloned());
        }
        if key.action.is_some() {
            if let Some(handlers) = self.handlers.get(&key) {
                matched.extend(handlers.iter().cloned());
            }
        }
        matched.extend(self.any_handlers.iter().cloned());
        matched
    }

    fn report(&self, error: WebhookError) -> WebhookError {
        if self.error_hooks.is_empty() {
            warn!("Unhandled webhook error: {}", error);
        }
        for hook in &self.error_hooks {
            hook(&error);
        }
        error
    }

    /// Runs every matching handler concurrently and waits for all of them.
    pub async fn receive(&self, event: WebhookEvent) -> Result<(), WebhookError> {
        let key = event.key();
        let handlers = self.matching_handlers(&event);
        debug!(
            "Dispatching {} (delivery {}) to {} handler(s)",
            key,
            event.id,
            handlers.len()
        );

        let mut tasks = JoinSet::new();
        for handler in handlers {
            tasks.spawn(handler(event.clone()));
        }

        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(e) => errors.push(anyhow::anyhow!("handler task failed: {}", e)),
            }
        }

        if errors.is_empty() {
            return Ok(());
        }
        Err(self.report(WebhookError::Handlers {
            event: key.to_string(),
            errors,
        }))
    }

    /// Verifies the signature, parses the JSON payload and dispatches it.
    pub async fn verify_and_receive(
        &self,
        id: &str,
        name: &str,
        signature: &str,
        payload: &[u8],
    ) -> Result<(), WebhookError> {
        if let Err(e) = self.verify(payload, signature) {
            return Err(self.report(e));
        }
        let payload = match serde_json::from_slice(payload) {
            Ok(payload) => payload,
            Err(e) => return Err(self.report(WebhookError::InvalidPayload(e))),
        };
        self.receive(WebhookEvent::new(id, name, payload)).await
    }
}

impl std::fmt::Debug for Webhooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Webhooks")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("any_handlers", &self.any_handlers.len())
            .field("error_hooks", &self.error_hooks.len())
            .finish_non_exhaustive()
    }
}
