use thiserror::Error;

/// Errors raised by the GitHub App client.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to sign app JWT: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("request to GitHub failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("OAuth error: {error}: {description}")]
    OAuth { error: String, description: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors raised while verifying or dispatching a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing webhook signature")]
    MissingSignature,

    #[error("malformed webhook signature: {0}")]
    MalformedSignature(String),

    #[error("webhook signature does not match payload")]
    SignatureMismatch,

    #[error("invalid webhook payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error(
        "{count} handler(s) failed for {event}: {summary}",
        count = .errors.len(),
        summary = join_errors(.errors)
    )]
    Handlers {
        event: String,
        errors: Vec<anyhow::Error>,
    },
}

impl WebhookError {
    /// True for failures caused by the sender rather than by a handler.
    pub fn is_rejected_delivery(&self) -> bool {
        !matches!(self, WebhookError::Handlers { .. })
    }
}

fn join_errors(errors: &[anyhow::Error]) -> String {
    errors
        .iter()
        .map(|e| format!("{:#}", e))
        .collect::<Vec<_>>()
        .join("; ")
}
