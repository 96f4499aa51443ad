//! API client for the hosted contribution-tracker backend.
//!
//! This module provides the `ApiClient` struct for authenticating and for
//! querying the `members` and `transactions` tables. Table access is
//! unconstrained "select all"; the backend enforces row-level authorization.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::warn;

use crate::auth::SessionData;
use crate::models::{Member, NewTransaction, Transaction};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Access-token lifetime assumed when the auth response omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    first_name: Option<String>,
}

/// Viewer identity as reported by the auth service's session check.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub email: String,
    pub first_name: String,
}

impl TokenResponse {
    fn into_session(self, fallback_email: &str) -> SessionData {
        SessionData {
            access_token: self.access_token,
            user_id: self.user.id,
            email: self.user.email.unwrap_or_else(|| fallback_email.to_string()),
            first_name: self.user.user_metadata.first_name.unwrap_or_default(),
            created_at: Utc::now(),
            expires_in_secs: self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        }
    }
}

/// API client for the hosted backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    anon_key: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client for a backend project.
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            anon_key: self.anon_key.clone(),
            token: Some(token),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    fn request_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert("apikey", header::HeaderValue::from_str(&self.anon_key)?);
        // Unauthenticated calls fall back to the anon key as the bearer.
        let bearer = self.token.as_deref().unwrap_or(&self.anon_key);
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", bearer))?,
        );
        Ok(headers)
    }

    // ===== Authentication =====

    /// Sign in with email and password, returning session data.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionData> {
        let url = format!("{}?grant_type=password", self.auth_url("token"));
        let body = serde_json::json!({ "email": email, "password": password });

        let response = self
            .client
            .post(&url)
            .headers(self.request_headers()?)
            .json(&body)
            .send()
            .await
            .context("Failed to send sign-in request")?;

        let response = Self::check_auth_response(response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse sign-in response")?;

        Ok(token.into_session(email))
    }

    /// Register a new account with profile metadata. The backend creates the
    /// matching member row; on success the new account is signed in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<SessionData> {
        let url = self.auth_url("signup");
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "data": {
                "first_name": first_name,
                "last_name": last_name,
            }
        });

        let response = self
            .client
            .post(&url)
            .headers(self.request_headers()?)
            .json(&body)
            .send()
            .await
            .context("Failed to send sign-up request")?;

        let response = Self::check_auth_response(response).await?;
        let text = response
            .text()
            .await
            .context("Failed to read sign-up response body")?;

        match serde_json::from_str::<TokenResponse>(&text) {
            Ok(token) => Ok(token.into_session(email)),
            // Projects with email confirmation enabled return the bare user
            // instead of a session.
            Err(_) => Err(ApiError::AuthFailed(
                "Account created - confirm your email, then log in".to_string(),
            )
            .into()),
        }
    }

    /// Invalidate the current session on the auth service.
    pub async fn sign_out(&self) -> Result<()> {
        let url = self.auth_url("logout");
        let response = self
            .client
            .post(&url)
            .headers(self.request_headers()?)
            .send()
            .await
            .context("Failed to send sign-out request")?;

        Self::check_auth_response(response).await?;
        Ok(())
    }

    /// Session check: ask the auth service who the bearer token belongs to.
    pub async fn fetch_user(&self) -> Result<UserProfile> {
        let url = self.auth_url("user");
        let response = self
            .client
            .get(&url)
            .headers(self.request_headers()?)
            .send()
            .await
            .context("Failed to send session check")?;

        let response = Self::check_auth_response(response).await?;
        let user: AuthUser = response
            .json()
            .await
            .context("Failed to parse session check response")?;

        Ok(UserProfile {
            email: user.email.unwrap_or_default(),
            first_name: user.user_metadata.first_name.unwrap_or_default(),
        })
    }

    // ===== Table Access =====

    /// Fetch all members (select all, no pagination).
    pub async fn fetch_members(&self) -> Result<Vec<Member>> {
        let url = format!("{}?select=*", self.rest_url("members"));
        self.get(&url).await
    }

    /// Fetch all transactions, newest first as the dashboard displays them.
    pub async fn fetch_transactions(&self) -> Result<Vec<Transaction>> {
        let url = format!(
            "{}?select=*&order=created_at.desc",
            self.rest_url("transactions")
        );
        self.get(&url).await
    }

    /// Insert a new transaction and return the stored row.
    pub async fn insert_transaction(&self, new: &NewTransaction) -> Result<Transaction> {
        let url = self.rest_url("transactions");

        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .post(&url)
                .headers(self.request_headers()?)
                .header("Prefer", "return=representation")
                .json(new)
                .send()
                .await
                .context("Failed to send transaction insert")?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let mut rows: Vec<Transaction> = response
                        .json()
                        .await
                        .context("Failed to parse inserted transaction")?;
                    return rows.pop().ok_or_else(|| {
                        ApiError::InvalidResponse("insert returned no rows".to_string()).into()
                    });
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = %url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    // ===== Response Handling =====

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit
    /// (should retry), or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Check an auth response, surfacing the service's message field.
    async fn check_auth_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_auth_status(status, &body).into())
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.request_headers()?)
                .send()
                .await
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_parse_token_response() {
        let json = r#"{
            "access_token": "jwt-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh",
            "user": {
                "id": "9f1c2a34-7b1d-4f6a-b1de-1c2d3e4f5a6b",
                "email": "achieng@example.com",
                "user_metadata": {"first_name": "Achieng", "last_name": "Odhiambo"}
            }
        }"#;

        let token: TokenResponse =
            serde_json::from_str(json).expect("token response should parse");
        let session = token.into_session("fallback@example.com");
        assert_eq!(session.access_token, "jwt-token");
        assert_eq!(session.email, "achieng@example.com");
        assert_eq!(session.first_name, "Achieng");
        assert_eq!(session.expires_in_secs, 3600);
    }

    #[test]
    fn test_token_response_defaults() {
        // Minimal response: no expiry, no metadata, no email on the user.
        let json = r#"{"access_token": "t", "user": {"id": "u1"}}"#;
        let token: TokenResponse =
            serde_json::from_str(json).expect("token response should parse");
        let session = token.into_session("given@example.com");
        assert_eq!(session.email, "given@example.com");
        assert_eq!(session.first_name, "");
        assert_eq!(session.expires_in_secs, DEFAULT_EXPIRES_IN_SECS);
    }

    #[test]
    fn test_parse_table_rows() {
        let json = r#"[
            {"id": 1, "name": "Alice", "email": "a@x.com", "permission": "admin"},
            {"id": 2, "name": "Bob", "email": "b@x.com", "permission": "user"}
        ]"#;
        let members: Vec<Member> = serde_json::from_str(json).expect("members should parse");
        assert_eq!(members.len(), 2);

        let json = r#"[{"id": 10, "member": 1, "amount": 50, "created_at": "2025-03-01T12:00:00Z"}]"#;
        let txs: Vec<Transaction> = serde_json::from_str(json).expect("transactions should parse");
        assert_eq!(txs[0].amount, Decimal::from(50));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let api = ApiClient::new("https://proj.example.co/", "anon")
            .expect("client should build");
        assert_eq!(
            api.auth_url("token"),
            "https://proj.example.co/auth/v1/token"
        );
        assert_eq!(
            api.rest_url("members"),
            "https://proj.example.co/rest/v1/members"
        );
    }
}
