use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use crate::github::webhooks::Webhooks;
use crate::models::webhook::{
    IssuesPayload, PullRequestPayload, PushPayload, RepositoryPayload, StarPayload, WebhookEvent,
};
use crate::utils::logging::EventLog;

/// Tag used for catch-all entries.
pub const ANY_TAG: &str = "webhook";
/// Tag used for error hook entries.
pub const ERROR_TAG: &str = "error";

pub type Describe = fn(&Value) -> anyhow::Result<String>;

/// Event keys with a dedicated message, in registration order.
pub const HANDLED_EVENTS: [(&str, Describe); 6] = [
    ("push", describe_push),
    ("pull_request", describe_pull_request),
    ("issues", describe_issues),
    ("star.created", describe_star),
    ("star.deleted", describe_star),
    ("repository", describe_repository),
];

fn parse<'a, T: Deserialize<'a>>(payload: &'a Value, event: &str) -> anyhow::Result<T> {
    T::deserialize(payload).with_context(|| format!("malformed {} payload", event))
}

pub fn describe_push(payload: &Value) -> anyhow::Result<String> {
    let push: PushPayload = parse(payload, "push")?;
    Ok(format!(
        "Push to {} ({}) by {}: {} commit(s)",
        push.repository.full_name,
        push.git_ref,
        push.pusher.name,
        push.commits.len()
    ))
}

pub fn describe_pull_request(payload: &Value) -> anyhow::Result<String> {
    let pr: PullRequestPayload = parse(payload, "pull_request")?;
    Ok(format!(
        "Pull request #{} {} in {}: {}",
        pr.pull_request.number, pr.action, pr.repository.full_name, pr.pull_request.title
    ))
}

pub fn describe_issues(payload: &Value) -> anyhow::Result<String> {
    let issues: IssuesPayload = parse(payload, "issues")?;
    Ok(format!(
        "Issue #{} {} in {}: {}",
        issues.issue.number, issues.action, issues.repository.full_name, issues.issue.title
    ))
}

pub fn describe_star(payload: &Value) -> anyhow::Result<String> {
    let star: StarPayload = parse(payload, "star")?;
    let verb = if star.action == "deleted" { "unstarred" } else { "starred" };
    Ok(format!(
        "{} {} {}",
        star.sender.login, verb, star.repository.full_name
    ))
}

pub fn describe_repository(payload: &Value) -> anyhow::Result<String> {
    let repo: RepositoryPayload = parse(payload, "repository")?;
    Ok(format!(
        "Repository {} {} by {}",
        repo.repository.full_name, repo.action, repo.sender.login
    ))
}

pub fn describe_any(event: &WebhookEvent) -> String {
    format!("Received {} event (delivery {})", event.key(), event.id)
}

async fn log_event(
    sink: Arc<dyn EventLog>,
    tag: &'static str,
    describe: Describe,
    event: WebhookEvent,
) -> anyhow::Result<()> {
    let message = describe(&event.payload)?;
    sink.info(tag, &message);
    Ok(())
}

async fn log_any(sink: Arc<dyn EventLog>, event: WebhookEvent) -> anyhow::Result<()> {
    sink.info(ANY_TAG, &describe_any(&event));
    Ok(())
}

/// Registers the logging handlers, the catch-all and the error hook. Each
/// handler turns one delivery into a single log line.
pub fn register(webhooks: &mut Webhooks, sink: Arc<dyn EventLog>) {
    for (key, describe) in HANDLED_EVENTS {
        let sink = sink.clone();
        webhooks.on(key, move |event| log_event(sink.clone(), key, describe, event));
    }

    let any_sink = sink.clone();
    webhooks.on_any(move |event| log_any(any_sink.clone(), event));

    webhooks.on_error(move |error| {
        sink.error(ERROR_TAG, &format!("Webhook error: {}", error));
    });
}
