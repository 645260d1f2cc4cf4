//! Opaque-token → identity-token exchange.
//!
//! The gateway never inspects access tokens itself; routes under a
//! `permitted` or `enforced` policy hand the opaque token to the identity
//! service and forward the returned identity token upstream as a bearer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The identity service answered, and the answer was "no".
    #[error("session is invalid")]
    InvalidSession,

    /// The identity service could not be reached or misbehaved.
    #[error("identity exchange failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl IdentityError {
    /// Whether the failure says anything about the token itself.
    pub fn is_invalid_session(&self) -> bool {
        matches!(self, Self::InvalidSession)
    }
}

/// Exchange capability; mocked in tests, HTTP-backed in production.
#[async_trait]
pub trait IdentityExchanger: Send + Sync {
    async fn exchange(&self, access_token: &str) -> Result<String, IdentityError>;
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    access_token: &'a str,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    identity_token: String,
}

/// HTTP client for the identity service.
pub struct IdentityClient {
    base_url: String,
    client: reqwest::Client,
}

impl IdentityClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl IdentityExchanger for IdentityClient {
    async fn exchange(&self, access_token: &str) -> Result<String, IdentityError> {
        let response = self
            .client
            .post(&self.base_url)
            .json(&ExchangeRequest { access_token })
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(IdentityError::InvalidSession);
        }

        let body: ExchangeResponse = response.json().await?;
        Ok(body.identity_token)
    }
}
