use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::{debug, info};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_WEB_BASE: &str = "https://github.com";
const OAUTH_AUTHORIZE_PATH: &str = "/login/oauth/authorize";
const OAUTH_TOKEN_PATH: &str = "/login/oauth/access_token";
const API_VERSION: &str = "2022-11-28";
const CLIENT_USER_AGENT: &str = "github-webhook-service";
const STATE_LENGTH: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct AppJwtClaims {
    iat: u64,
    exp: u64,
    iss: String,
}

#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Installation {
    pub id: u64,
    pub account: Option<Account>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationToken {
    pub token: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OAuthTokenResponse {
    Token(OAuthToken),
    Error {
        error: String,
        #[serde(default)]
        error_description: String,
    },
}

#[derive(Debug, Serialize)]
struct OAuthCodeExchange<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
}

/// Random value for the OAuth `state` parameter.
pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

/// GitHub App client: signs App JWTs, requests installation tokens and
/// drives the OAuth web flow. Key material is only checked on first use.
#[derive(Clone)]
pub struct App {
    app_id: String,
    private_key: String,
    oauth: OAuthCredentials,
    http: Client,
    api_base: String,
    oauth_base: String,
}

impl App {
    pub fn new(app_id: impl Into<String>, private_key: impl Into<String>, oauth: OAuthCredentials) -> Self {
        App {
            app_id: app_id.into(),
            private_key: private_key.into(),
            oauth,
            http: Client::new(),
            api_base: GITHUB_API_BASE.to_string(),
            oauth_base: GITHUB_WEB_BASE.to_string(),
        }
    }

    /// Points API calls at another host, e.g. GitHub Enterprise Server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Host serving `/login/oauth/*`, e.g. the GitHub Enterprise Server web root.
    pub fn with_oauth_base(mut self, oauth_base: impl Into<String>) -> Self {
        self.oauth_base = oauth_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn client_id(&self) -> &str {
        &self.oauth.client_id
    }

    /// App JWT valid for nine minutes, backdated a minute for clock drift.
    pub fn create_jwt(&self) -> Result<String, AppError> {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = AppJwtClaims {
            iat: now.saturating_sub(60),
            exp: now + 9 * 60,
            iss: self.app_id.clone(),
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }

    async fn check(response: Response) -> Result<Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(AppError::Api {
            status: status.as_u16(),
            body,
        })
    }

    fn app_request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, AppError> {
        let jwt = self.create_jwt()?;
        Ok(self
            .http
            .request(method, format!("{}{}", self.api_base, path))
            .header(AUTHORIZATION, format!("Bearer {}", jwt))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION))
    }

    /// Installations of this App.
    pub async fn installations(&self) -> Result<Vec<Installation>, AppError> {
        let response = self
            .app_request(reqwest::Method::GET, "/app/installations")?
            .send()
            .await?;
        let installations: Vec<Installation> = Self::check(response).await?.json().await?;
        debug!("App {} has {} installation(s)", self.app_id, installations.len());
        Ok(installations)
    }

    /// Creates an installation access token.
    pub async fn installation_token(&self, installation_id: u64) -> Result<InstallationToken, AppError> {
        let path = format!("/app/installations/{}/access_tokens", installation_id);
        let response = self
            .app_request(reqwest::Method::POST, &path)?
            .send()
            .await?;
        let token: InstallationToken = Self::check(response).await?.json().await?;
        info!(
            "Created installation token for {} (expires {})",
            installation_id, token.expires_at
        );
        Ok(token)
    }

    /// URL the user is sent to for the OAuth web flow, with the state used.
    pub fn oauth_authorization_url(&self, state: Option<&str>) -> Result<(Url, String), AppError> {
        let state = state.map(str::to_string).unwrap_or_else(generate_state);
        let url = Url::parse_with_params(
            &format!("{}{}", self.oauth_base, OAUTH_AUTHORIZE_PATH),
            &[
                ("client_id", self.oauth.client_id.as_str()),
                ("redirect_uri", self.oauth.redirect_uri.as_str()),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| AppError::InvalidUrl(e.to_string()))?;
        Ok((url, state))
    }

    /// Exchanges an OAuth code for a user access token.
    pub async fn exchange_oauth_code(&self, code: &str) -> Result<OAuthToken, AppError> {
        let body = OAuthCodeExchange {
            client_id: &self.oauth.client_id,
            client_secret: &self.oauth.client_secret,
            code,
            redirect_uri: &self.oauth.redirect_uri,
        };
        let response = self
            .http
            .post(format!("{}{}", self.oauth_base, OAUTH_TOKEN_PATH))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .json(&body)
            .send()
            .await?;

        let parsed: OAuthTokenResponse = Self::check(response).await?.json().await?;
        match parsed {
            OAuthTokenResponse::Token(token) => Ok(token),
            OAuthTokenResponse::Error {
                error,
                error_description,
            } => Err(AppError::OAuth {
                error,
                description: error_description,
            }),
        }
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("app_id", &self.app_id)
            .field("client_id", &self.oauth.client_id)
            .field("api_base", &self.api_base)
            .field("oauth_base", &self.oauth_base)
            .finish_non_exhaustive()
    }
}
