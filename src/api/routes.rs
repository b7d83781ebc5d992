use log::{error, info, warn};
use rocket::data::{Data, ToByteUnit};
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::serde::Serialize;
use rocket::{get, post, routes, Route, State};

use crate::error::{AppError, WebhookError};
use crate::github::GitHubContext;

pub const MOUNT_POINT: &str = "/api/github";

pub const EVENT_HEADER: &str = "X-GitHub-Event";
pub const DELIVERY_HEADER: &str = "X-GitHub-Delivery";
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Cookie holding the OAuth `state` between login and callback.
pub const STATE_COOKIE: &str = "github_oauth_state";
const STATE_COOKIE_PATH: &str = "/api/github/oauth";

/// GitHub caps webhook payloads at 25 MB.
const MAX_PAYLOAD_MIB: u64 = 25;

/// Delivery headers GitHub sends with every webhook.
#[derive(Debug)]
pub struct WebhookHeaders {
    pub event: String,
    pub delivery: String,
    pub signature: String,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for WebhookHeaders {
    type Error = String;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let headers = req.headers();
        let missing: Vec<&str> = [EVENT_HEADER, DELIVERY_HEADER, SIGNATURE_HEADER]
            .into_iter()
            .filter(|name| headers.get_one(name).map_or(true, str::is_empty))
            .collect();
        if !missing.is_empty() {
            let message = format!("missing required header(s): {}", missing.join(", "));
            warn!("Rejected webhook delivery: {}", message);
            return Outcome::Error((Status::BadRequest, message));
        }

        let get = |name| headers.get_one(name).unwrap_or_default().to_string();
        Outcome::Success(WebhookHeaders {
            event: get(EVENT_HEADER),
            delivery: get(DELIVERY_HEADER),
            signature: get(SIGNATURE_HEADER),
        })
    }
}

fn webhook_status(err: &WebhookError) -> Status {
    if !err.is_rejected_delivery() {
        return Status::InternalServerError;
    }
    match err {
        WebhookError::SignatureMismatch => Status::Unauthorized,
        _ => Status::BadRequest,
    }
}

#[post("/webhooks", data = "<body>")]
pub async fn github_webhook(
    ctx: &State<GitHubContext>,
    headers: WebhookHeaders,
    body: Data<'_>,
) -> Status {
    let Some(webhooks) = ctx.webhooks() else {
        warn!("Webhook {} received but the GitHub App is not configured", headers.delivery);
        return Status::ServiceUnavailable;
    };

    let payload = match body.open(MAX_PAYLOAD_MIB.mebibytes()).into_bytes().await {
        Ok(payload) if payload.is_complete() => payload.into_inner(),
        Ok(_) => {
            warn!("Webhook {} exceeds {} MiB", headers.delivery, MAX_PAYLOAD_MIB);
            return Status::PayloadTooLarge;
        }
        Err(e) => {
            error!("Failed to read webhook {}: {}", headers.delivery, e);
            return Status::BadRequest;
        }
    };

    info!("Webhook {} received: {}", headers.delivery, headers.event);
    match webhooks
        .verify_and_receive(&headers.delivery, &headers.event, &headers.signature, &payload)
        .await
    {
        Ok(()) => Status::Ok,
        Err(e) => webhook_status(&e),
    }
}

/// Redirects to GitHub and remembers the `state` in a cookie so the callback
/// can reject responses to logins it did not start.
#[get("/oauth/login?<state>")]
pub fn oauth_login(
    ctx: &State<GitHubContext>,
    cookies: &CookieJar<'_>,
    state: Option<&str>,
) -> Result<Redirect, Status> {
    let app = ctx.app().ok_or(Status::ServiceUnavailable)?;
    match app.oauth_authorization_url(state) {
        Ok((url, state)) => {
            cookies.add(
                Cookie::build((STATE_COOKIE, state))
                    .path(STATE_COOKIE_PATH)
                    .http_only(true)
                    .same_site(SameSite::Lax),
            );
            Ok(Redirect::to(url.to_string()))
        }
        Err(e) => {
            error!("Failed to build OAuth authorization URL: {}", e);
            Err(Status::InternalServerError)
        }
    }
}

#[get("/oauth/callback?<code>&<state>")]
pub async fn oauth_callback(
    ctx: &State<GitHubContext>,
    cookies: &CookieJar<'_>,
    code: Option<&str>,
    state: Option<&str>,
) -> Result<&'static str, Status> {
    let app = ctx.app().ok_or(Status::ServiceUnavailable)?;

    let expected = cookies.get(STATE_COOKIE).map(|c| c.value().to_string());
    cookies.remove(Cookie::build(STATE_COOKIE).path(STATE_COOKIE_PATH));
    match (expected.as_deref(), state) {
        (Some(expected), Some(state)) if expected == state => {}
        _ => {
            warn!("OAuth callback rejected: state does not match a login started here");
            return Err(Status::BadRequest);
        }
    }

    let code = code.filter(|c| !c.is_empty()).ok_or(Status::BadRequest)?;

    match app.exchange_oauth_code(code).await {
        Ok(token) => {
            info!("OAuth token created (scope: {:?})", token.scope);
            Ok("Token created successfully")
        }
        Err(e @ AppError::OAuth { .. }) => {
            warn!("OAuth code exchange rejected: {}", e);
            Err(Status::BadRequest)
        }
        Err(e) => {
            error!("OAuth code exchange failed: {}", e);
            Err(Status::BadGateway)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct IntegrationStatus {
    pub app: bool,
    pub webhooks: bool,
}

#[get("/status")]
pub fn status(ctx: &State<GitHubContext>) -> Json<IntegrationStatus> {
    Json(IntegrationStatus {
        app: ctx.app().is_some(),
        webhooks: ctx.webhooks().is_some(),
    })
}

pub fn all() -> Vec<Route> {
    routes![github_webhook, oauth_login, oauth_callback, status]
}

/// Rocket instance serving the integration routes.
pub fn build(ctx: GitHubContext) -> rocket::Rocket<rocket::Build> {
    rocket::build().mount(MOUNT_POINT, all()).manage(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::testing::{full_env, lookup};
    use crate::utils::logging::testing::RecordingLog;
    use rocket::http::Header;
    use rocket::local::asynchronous::Client;
    use std::sync::Arc;

    const PUSH_BODY: &str = r#"{"ref":"refs/heads/main","repository":{"full_name":"org/repo"},"pusher":{"name":"alice"},"commits":[]}"#;

    async fn client_with(log: Arc<RecordingLog>) -> Client {
        let env = full_env();
        let ctx = GitHubContext::initialize_with(lookup(&env), log).await;
        Client::tracked(build(ctx)).await.unwrap()
    }

    fn signature(body: &str) -> String {
        crate::utils::hmac::sign_payload(body.as_bytes(), "webhook-secret")
    }

    #[rocket::async_test]
    async fn test_signed_push_is_accepted_and_logged() {
        let log = Arc::new(RecordingLog::default());
        let client = client_with(log.clone()).await;

        let response = client
            .post("/api/github/webhooks")
            .header(Header::new(EVENT_HEADER, "push"))
            .header(Header::new(DELIVERY_HEADER, "d-1"))
            .header(Header::new(SIGNATURE_HEADER, signature(PUSH_BODY)))
            .body(PUSH_BODY)
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let push = log.with_tag("push");
        assert_eq!(push.len(), 1);
        assert!(push[0].message.contains("org/repo"));
        assert!(push[0].message.contains("alice"));
    }

    #[rocket::async_test]
    async fn test_bad_signature_is_rejected() {
        let log = Arc::new(RecordingLog::default());
        let client = client_with(log.clone()).await;

        let response = client
            .post("/api/github/webhooks")
            .header(Header::new(EVENT_HEADER, "push"))
            .header(Header::new(DELIVERY_HEADER, "d-1"))
            .header(Header::new(SIGNATURE_HEADER, signature("something else")))
            .body(PUSH_BODY)
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Unauthorized);
        assert!(log.with_tag("push").is_empty());
        assert_eq!(log.errors().len(), 1);
    }

    #[rocket::async_test]
    async fn test_missing_headers_is_bad_request() {
        let client = client_with(Arc::new(RecordingLog::default())).await;

        let response = client
            .post("/api/github/webhooks")
            .header(Header::new(EVENT_HEADER, "push"))
            .body(PUSH_BODY)
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_failing_handler_returns_server_error() {
        let log = Arc::new(RecordingLog::default());
        let client = client_with(log.clone()).await;
        let body = r#"{"pusher":{"name":"alice"}}"#;

        let response = client
            .post("/api/github/webhooks")
            .header(Header::new(EVENT_HEADER, "push"))
            .header(Header::new(DELIVERY_HEADER, "d-2"))
            .header(Header::new(SIGNATURE_HEADER, signature(body)))
            .body(body)
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::InternalServerError);
        assert_eq!(log.errors().len(), 1);
    }

    #[rocket::async_test]
    async fn test_uninitialized_context() {
        let client = Client::tracked(build(GitHubContext::uninitialized()))
            .await
            .unwrap();

        let response = client
            .post("/api/github/webhooks")
            .header(Header::new(EVENT_HEADER, "push"))
            .header(Header::new(DELIVERY_HEADER, "d-1"))
            .header(Header::new(SIGNATURE_HEADER, signature(PUSH_BODY)))
            .body(PUSH_BODY)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::ServiceUnavailable);

        let response = client.get("/api/github/status").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(
            response.into_string().await.unwrap(),
            r#"{"app":false,"webhooks":false}"#
        );

        let response = client.get("/api/github/oauth/login").dispatch().await;
        assert_eq!(response.status(), Status::ServiceUnavailable);
    }

    #[rocket::async_test]
    async fn test_oauth_login_redirects_to_github() {
        let client = client_with(Arc::new(RecordingLog::default())).await;

        let response = client
            .get("/api/github/oauth/login?state=abc")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::SeeOther);
        let location = response.headers().get_one("Location").unwrap();
        assert!(location.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(location.contains("client_id=Iv1.0123456789abcdef"));
        assert!(location.contains("state=abc"));

        let cookie = response.cookies().get(STATE_COOKIE).unwrap();
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
    }

    #[rocket::async_test]
    async fn test_oauth_callback_rejects_foreign_state() {
        let client = client_with(Arc::new(RecordingLog::default())).await;

        // No login happened, so there is no state to compare against.
        let response = client
            .get("/api/github/oauth/callback?code=c0de&state=abc")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        client
            .get("/api/github/oauth/login?state=abc")
            .dispatch()
            .await;
        let response = client
            .get("/api/github/oauth/callback?code=c0de&state=forged")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_oauth_callback_state_is_single_use() {
        let client = client_with(Arc::new(RecordingLog::default())).await;
        client
            .get("/api/github/oauth/login?state=abc")
            .dispatch()
            .await;

        // Matching state but no code: rejected, and the state is consumed.
        let response = client
            .get("/api/github/oauth/callback?state=abc")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        assert!(client.cookies().get(STATE_COOKIE).is_none());
    }

    #[test]
    fn test_webhook_status_mapping() {
        assert_eq!(webhook_status(&WebhookError::SignatureMismatch), Status::Unauthorized);
        assert_eq!(webhook_status(&WebhookError::MissingSignature), Status::BadRequest);
        assert_eq!(
            webhook_status(&WebhookError::MalformedSignature("sha1=00".to_string())),
            Status::BadRequest
        );
        let invalid = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(webhook_status(&WebhookError::InvalidPayload(invalid)), Status::BadRequest);
        let failed = WebhookError::Handlers {
            event: "push".to_string(),
            errors: vec![anyhow::anyhow!("boom")],
        };
        assert_eq!(webhook_status(&failed), Status::InternalServerError);
    }

    #[rocket::async_test]
    async fn test_oauth_callback_requires_code() {
        let client = client_with(Arc::new(RecordingLog::default())).await;
        let response = client.get("/api/github/oauth/callback").dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);
    }
}
