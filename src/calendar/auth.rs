use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use super::{CalendarApi, CalendarAuthorizer, GoogleCalendar};
use crate::error::AuthError;
use crate::settings::AuthSettings;

// If modifying these scopes, delete the stored token.
const SCOPES: &[&str] = &["https://www.googleapis.com/auth/calendar"];
const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const REFRESH_MARGIN_MS: i64 = 60_000;

#[derive(Deserialize)]
struct ClientSecrets {
    installed: InstalledApp,
}

/// OAuth client of type "installed application".
#[derive(Debug, Clone, Deserialize)]
pub struct InstalledApp {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.into()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.into()
}

impl InstalledApp {
    fn redirect_uri(&self) -> Result<&str, AuthError> {
        self.redirect_uris.first().map(String::as_str).ok_or(AuthError::NoRedirectUri)
    }

    /// Page the user visits to grant calendar access.
    pub fn consent_url(&self) -> Result<String, AuthError> {
        let scope = SCOPES.join(" ");
        let url = Url::parse_with_params(
            &self.auth_uri,
            &[
                ("access_type", "offline"),
                ("scope", scope.as_str()),
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri()?),
            ],
        )
        .map_err(|e| AuthError::Url(format!("{}: {}", self.auth_uri, e)))?;
        Ok(url.to_string())
    }
}

/// Token file contents. `expiry_date` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

impl StoredToken {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date
            .is_some_and(|expiry| expiry - REFRESH_MARGIN_MS <= now.timestamp_millis())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
    token_type: Option<String>,
}

impl TokenResponse {
    /// Refresh responses omit the refresh token; keep the one we had.
    fn into_token(self, now: DateTime<Utc>, previous_refresh: Option<String>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            scope: self.scope,
            token_type: self.token_type,
            expiry_date: self.expires_in.map(|s| now.timestamp_millis() + s * 1000),
        }
    }
}

/// Google OAuth for an installed app, backed by the client secrets and token files.
pub struct GoogleAuthorizer {
    settings: AuthSettings,
    api_base: String,
    interactive: bool,
    client: reqwest::Client,
}

impl GoogleAuthorizer {
    /// `interactive` allows prompting on stdin when no token is stored yet.
    pub fn new(settings: &AuthSettings, api_base: &str, interactive: bool) -> Self {
        GoogleAuthorizer {
            settings: settings.clone(),
            api_base: api_base.to_string(),
            interactive,
            client: reqwest::Client::new(),
        }
    }

    async fn load_app(&self) -> Result<InstalledApp, AuthError> {
        let path = &self.settings.credentials_path;
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| AuthError::Read { path: path.display().to_string(), source })?;
        let secrets: ClientSecrets = serde_json::from_str(&text)
            .map_err(|source| AuthError::Malformed { what: "client secrets", source })?;
        Ok(secrets.installed)
    }

    async fn load_token(&self) -> Result<Option<StoredToken>, AuthError> {
        let path = &self.settings.token_path;
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(AuthError::Read { path: path.display().to_string(), source }),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| AuthError::Malformed { what: "stored token", source })
    }

    async fn store_token(&self, token: &StoredToken) -> Result<(), AuthError> {
        let path: &Path = &self.settings.token_path;
        let body = serde_json::to_string(token)
            .map_err(|source| AuthError::Malformed { what: "stored token", source })?;
        tokio::fs::write(path, body)
            .await
            .map_err(|source| AuthError::Write { path: path.display().to_string(), source })?;
        info!("Token stored to {}", path.display());
        Ok(())
    }

    async fn request_token(
        &self,
        app: &InstalledApp,
        form: &[(&str, &str)],
        previous_refresh: Option<String>,
    ) -> Result<StoredToken, AuthError> {
        let response = self.client.post(&app.token_uri).form(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { status, body });
        }
        let granted: TokenResponse = response.json().await?;
        Ok(granted.into_token(Utc::now(), previous_refresh))
    }

    async fn refresh(&self, app: &InstalledApp, token: StoredToken) -> Result<StoredToken, AuthError> {
        let refresh_token = token.refresh_token.ok_or(AuthError::NoRefreshToken)?;
        debug!("Refreshing access token");
        let form = [
            ("client_id", app.client_id.as_str()),
            ("client_secret", app.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let fresh = self.request_token(app, &form, Some(refresh_token.clone())).await?;
        self.store_token(&fresh).await?;
        Ok(fresh)
    }

    async fn exchange_code(&self, app: &InstalledApp, code: &str) -> Result<StoredToken, AuthError> {
        let form = [
            ("code", code),
            ("client_id", app.client_id.as_str()),
            ("client_secret", app.client_secret.as_str()),
            ("redirect_uri", app.redirect_uri()?),
            ("grant_type", "authorization_code"),
        ];
        let token = self.request_token(app, &form, None).await?;
        self.store_token(&token).await?;
        Ok(token)
    }

    /// Print the consent URL, read the code from stdin, exchange and store the token.
    pub async fn authorize_interactively(&self) -> Result<StoredToken, AuthError> {
        let app = self.load_app().await?;
        self.prompt_for_token(&app).await
    }

    async fn prompt_for_token(&self, app: &InstalledApp) -> Result<StoredToken, AuthError> {
        println!("Authorize this app by visiting this url: {}", app.consent_url()?);
        println!("Enter the code from that page here: ");
        let mut code = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut code)
            .await
            .map_err(AuthError::Prompt)?;
        self.exchange_code(app, code.trim()).await
    }

    /// A usable access token: stored, refreshed, or freshly granted.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let app = self.load_app().await?;
        let token = match self.load_token().await? {
            Some(token) if token.needs_refresh(Utc::now()) => self.refresh(&app, token).await?,
            Some(token) => token,
            None if self.interactive => self.prompt_for_token(&app).await?,
            None => return Err(AuthError::AuthorizationRequired { url: app.consent_url()? }),
        };
        Ok(token.access_token)
    }
}

#[async_trait]
impl CalendarAuthorizer for GoogleAuthorizer {
    async fn authorize(&self) -> Result<Box<dyn CalendarApi>, AuthError> {
        let token = self.access_token().await?;
        let calendar = GoogleCalendar::new(self.client.clone(), &self.api_base, token)
            .map_err(|e| AuthError::Url(e.to_string()))?;
        Ok(Box::new(calendar))
    }
}

// ── Tests ──
