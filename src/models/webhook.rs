use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Repository {
    pub full_name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Pusher {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref", default)]
    pub git_ref: String,
    pub repository: Repository,
    pub pusher: Pusher,
    #[serde(default)]
    pub commits: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PullRequestPayload {
    pub action: String,
    pub pull_request: PullRequest,
    pub repository: Repository,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssuesPayload {
    pub action: String,
    pub issue: Issue,
    pub repository: Repository,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StarPayload {
    pub action: String,
    pub repository: Repository,
    pub sender: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RepositoryPayload {
    pub action: String,
    pub repository: Repository,
    pub sender: User,
}

/// Event names with a dedicated handler. Everything else lands in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    Push,
    PullRequest,
    Issues,
    Star,
    Repository,
    Other(String),
}

impl EventName {
    pub fn as_str(&self) -> &str {
        match self {
            EventName::Push => "push",
            EventName::PullRequest => "pull_request",
            EventName::Issues => "issues",
            EventName::Star => "star",
            EventName::Repository => "repository",
            EventName::Other(name) => name,
        }
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        match name {
            "push" => EventName::Push,
            "pull_request" => EventName::PullRequest,
            "issues" => EventName::Issues,
            "star" => EventName::Star,
            "repository" => EventName::Repository,
            other => EventName::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key a handler is registered under: an event name and optionally an action,
/// written `name` or `name.action`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub event: EventName,
    pub action: Option<String>,
}

impl HandlerKey {
    pub fn new(event: EventName, action: Option<&str>) -> Self {
        HandlerKey {
            event,
            action: action.map(str::to_string),
        }
    }
}

impl From<&str> for HandlerKey {
    fn from(key: &str) -> Self {
        match key.split_once('.') {
            Some((event, action)) => HandlerKey::new(EventName::from(event), Some(action)),
            None => HandlerKey::new(EventName::from(key), None),
        }
    }
}

impl std::fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.action {
            Some(action) => write!(f, "{}.{}", self.event, action),
            None => write!(f, "{}", self.event),
        }
    }
}

/// One webhook delivery after verification.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub id: String,
    pub name: EventName,
    pub payload: Value,
}

impl WebhookEvent {
    pub fn new(id: impl Into<String>, name: &str, payload: Value) -> Self {
        WebhookEvent {
            id: id.into(),
            name: EventName::from(name),
            payload,
        }
    }

    pub fn action(&self) -> Option<&str> {
        self.payload.get("action").and_then(Value::as_str)
    }

    /// `name.action` when the payload carries an action, `name` otherwise.
    pub fn key(&self) -> HandlerKey {
        HandlerKey::new(self.name.clone(), self.action())
    }
}
