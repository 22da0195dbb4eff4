//! OAuth for the calendar API: the installed-app client secrets in `credentials.json`, the
//! authorized user token in `token.json`, refresh-token exchange and the one-time browser
//! consent through a loopback redirect.

use crate::storage::Store;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

pub const SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

// refresh this long before the recorded expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The OAuth client downloaded from the cloud console as `credentials.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// `credentials.json` nests the client under the application type.
#[derive(Debug, Deserialize)]
pub(crate) struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecretsFile {
    pub(crate) fn into_secrets(self) -> Option<ClientSecrets> {
        self.installed.or(self.web)
    }
}

impl ClientSecrets {
    /// The consent page that redirects back to `redirect_uri` with a code.
    pub fn consent_url(&self, redirect_uri: &str) -> Result<Url> {
        let mut url = Url::parse(&self.auth_uri)
            .with_context(|| format!("Invalid authorization url {}", self.auth_uri))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        Ok(url)
    }
}

/// An authorized user, persisted as `token.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Whether the access token can still be used at `now`. A token without an expiry
    /// never goes stale.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now + Duration::seconds(EXPIRY_MARGIN_SECS) < expiry,
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

fn request_token(
    client: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = client
        .post(token_uri)
        .form(form)
        .send()
        .with_context(|| format!("Failed to reach token endpoint {}", token_uri))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(match serde_json::from_str::<TokenError>(&body) {
            Ok(err) => anyhow!(
                "Token endpoint refused the request ({}): {} {}",
                status,
                err.error,
                err.error_description.unwrap_or_default()
            ),
            Err(_) => anyhow!("Token endpoint refused the request ({})", status),
        });
    }

    response.json().context("Unexpected token endpoint response")
}

fn expiry_after(now: DateTime<Utc>, expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in.map(|secs| now + Duration::seconds(secs))
}

fn scopes_of(response: &TokenResponse) -> Vec<String> {
    match &response.scope {
        Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
        None => vec![SCOPE.to_string()],
    }
}

/// Trade the refresh token for a new access token. The refresh token is kept when the
/// endpoint does not rotate it.
pub fn refresh(client: &Client, token: &StoredToken, now: DateTime<Utc>) -> Result<StoredToken> {
    let refresh_token = token
        .refresh_token
        .as_deref()
        .ok_or_else(|| anyhow!("Stored token has no refresh token"))?;

    debug!("Refreshing access token at {}", token.token_uri);
    let response = request_token(
        client,
        &token.token_uri,
        &[
            ("grant_type", "refresh_token"),
            ("client_id", token.client_id.as_str()),
            ("client_secret", token.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ],
    )?;

    Ok(StoredToken {
        scopes: if response.scope.is_some() {
            scopes_of(&response)
        } else {
            token.scopes.clone()
        },
        expiry: expiry_after(now, response.expires_in),
        refresh_token: response.refresh_token.or_else(|| token.refresh_token.clone()),
        token: response.access_token,
        ..token.clone()
    })
}

/// Trade an authorization code from the consent redirect for a token.
pub fn exchange_code(
    client: &Client,
    secrets: &ClientSecrets,
    code: &str,
    redirect_uri: &str,
    now: DateTime<Utc>,
) -> Result<StoredToken> {
    let response = request_token(
        client,
        &secrets.token_uri,
        &[
            ("grant_type", "authorization_code"),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ],
    )?;

    Ok(StoredToken {
        scopes: scopes_of(&response),
        expiry: expiry_after(now, response.expires_in),
        refresh_token: response.refresh_token,
        token: response.access_token,
        token_uri: secrets.token_uri.clone(),
        client_id: secrets.client_id.clone(),
        client_secret: secrets.client_secret.clone(),
    })
}

fn setup_hint(store: &Store) -> String {
    format!(
        "Create a Desktop OAuth client for the Google Calendar API, save its JSON as {} \
         and run 'baby-sleep authorize'",
        store.credentials_path().display()
    )
}

/// A usable access token from `token.json`, refreshed and saved back when it has
/// expired.
pub fn access_token(store: &Store, client: &Client, now: DateTime<Utc>) -> Result<String> {
    let Some(token) = store.load_token()? else {
        bail!("Calendar is not authorized. {}", setup_hint(store));
    };
    if token.is_fresh(now) {
        return Ok(token.token);
    }
    if token.refresh_token.is_none() {
        bail!(
            "Calendar token expired and cannot be refreshed. Run 'baby-sleep authorize' again"
        );
    }

    let refreshed = refresh(client, &token, now)
        .context("Failed to refresh calendar token, run 'baby-sleep authorize' again")?;
    store.save_token(&refreshed)?;
    info!("Refreshed calendar token, valid until {:?}", refreshed.expiry);
    Ok(refreshed.token)
}

const CALLBACK_PAGE: &str =
    "<html><body><h2>Baby sleep is authorized.</h2><p>You can close this tab.</p></body></html>";

/// Serve one redirect on `listener` and return the authorization code it carries.
pub fn wait_for_code(listener: &TcpListener) -> Result<String> {
    let (stream, peer) = listener
        .accept()
        .context("Failed to accept the consent redirect")?;
    debug!("Consent redirect from {}", peer);

    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .context("Failed to read the consent redirect")?;
    // drain the headers so closing the socket does not reset the browser
    let mut header = String::new();
    while reader.read_line(&mut header)? > 2 {
        header.clear();
    }

    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| anyhow!("Malformed consent redirect: {}", request_line.trim()))?;
    let url = Url::parse("http://localhost")?
        .join(target)
        .with_context(|| format!("Malformed consent redirect target {}", target))?;

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        CALLBACK_PAGE.len(),
        CALLBACK_PAGE
    );
    (&stream).write_all(response.as_bytes())?;

    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };
    if let Some(code) = param("code") {
        return Ok(code);
    }
    match param("error") {
        Some(error) => bail!("Authorization was denied: {}", error),
        None => bail!("Consent redirect carried no authorization code"),
    }
}

/// One-time consent: print the consent URL, wait for the browser to come back to a
/// loopback port and save the resulting token.
pub fn authorize(store: &Store, client: &Client, now: DateTime<Utc>) -> Result<StoredToken> {
    let Some(secrets) = store.load_client_secrets()? else {
        bail!("No OAuth client found. {}", setup_hint(store));
    };

    let listener =
        TcpListener::bind("127.0.0.1:0").context("Failed to open a local port for consent")?;
    let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());
    let url = secrets.consent_url(&redirect_uri)?;

    println!("Open this page in a browser and allow calendar access:\n\n{}\n", url);
    let code = wait_for_code(&listener)?;

    let token = exchange_code(client, &secrets, &code, &redirect_uri, now)?;
    store.save_token(&token)?;
    info!("Saved calendar token to {}", store.token_path().display());
    Ok(token)
}
