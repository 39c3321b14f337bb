//! OAuth identity-provider clients (Google, GitHub).
//!
//! The server side of the authorization-code flow: build the redirect,
//! exchange the code, fetch the profile. Account resolution happens in
//! the identity store.

use crate::config::OAuthCredentials;
use crate::error::ApiError;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    Github,
}

impl Provider {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "google" => Some(Self::Google),
            "github" => Some(Self::Github),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }
}

/// Provider-side identity, normalised across providers.
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub provider_account_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Build the provider authorization redirect URL.
pub fn authorize_url(provider: Provider, credentials: &OAuthCredentials, state: &str) -> String {
    let redirect = urlencode(&credentials.callback_url);
    match provider {
        Provider::Google => format!(
            "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope=openid%20email%20profile&state={}",
            urlencode(&credentials.client_id),
            redirect,
            state,
        ),
        Provider::Github => format!(
            "https://github.com/login/oauth/authorize?client_id={}&redirect_uri={}&scope=read:user%20user:email&state={}",
            urlencode(&credentials.client_id),
            redirect,
            state,
        ),
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

/// Exchange an authorization code for the provider profile.
pub async fn exchange_code(
    provider: Provider,
    credentials: &OAuthCredentials,
    http: &reqwest::Client,
    code: &str,
) -> Result<OAuthProfile, ApiError> {
    match provider {
        Provider::Google => exchange_google(credentials, http, code).await,
        Provider::Github => exchange_github(credentials, http, code).await,
    }
}

async fn exchange_google(
    credentials: &OAuthCredentials,
    http: &reqwest::Client,
    code: &str,
) -> Result<OAuthProfile, ApiError> {
    let token: TokenResponse = http
        .post("https://oauth2.googleapis.com/token")
        .form(&[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", credentials.callback_url.as_str()),
        ])
        .send()
        .await
        .map_err(provider_error)?
        .json()
        .await
        .map_err(provider_error)?;

    let access_token = token
        .access_token
        .ok_or_else(|| ApiError::Unauthenticated { expired: false })?;

    let profile: GoogleUserInfo = http
        .get("https://www.googleapis.com/oauth2/v2/userinfo")
        .bearer_auth(&access_token)
        .send()
        .await
        .map_err(provider_error)?
        .json()
        .await
        .map_err(provider_error)?;

    Ok(OAuthProfile {
        provider_account_id: profile.id,
        email: profile.email,
        display_name: profile.name,
    })
}

async fn exchange_github(
    credentials: &OAuthCredentials,
    http: &reqwest::Client,
    code: &str,
) -> Result<OAuthProfile, ApiError> {
    let token: TokenResponse = http
        .post("https://github.com/login/oauth/access_token")
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", credentials.callback_url.as_str()),
        ])
        .send()
        .await
        .map_err(provider_error)?
        .json()
        .await
        .map_err(provider_error)?;

    let access_token = token
        .access_token
        .ok_or_else(|| ApiError::Unauthenticated { expired: false })?;

    let user: GithubUser = http
        .get("https://api.github.com/user")
        .bearer_auth(&access_token)
        .header(reqwest::header::USER_AGENT, "keyhaven")
        .send()
        .await
        .map_err(provider_error)?
        .json()
        .await
        .map_err(provider_error)?;

    // The profile email is often hidden; fall back to the primary
    // verified address from the emails endpoint.
    let email = match user.email {
        Some(email) => Some(email),
        None => http
            .get("https://api.github.com/user/emails")
            .bearer_auth(&access_token)
            .header(reqwest::header::USER_AGENT, "keyhaven")
            .send()
            .await
            .map_err(provider_error)?
            .json::<Vec<GithubEmail>>()
            .await
            .ok()
            .and_then(|emails| {
                emails
                    .into_iter()
                    .find(|e| e.primary && e.verified)
                    .map(|e| e.email)
            }),
    };

    Ok(OAuthProfile {
        provider_account_id: user.id.to_string(),
        email,
        display_name: user.name.or(Some(user.login)),
    })
}

fn provider_error(e: reqwest::Error) -> ApiError {
    ApiError::Internal(format!("Identity provider call failed: {}", e))
}

fn urlencode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
