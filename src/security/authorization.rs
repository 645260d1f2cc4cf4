//! Authorization policy block and token extraction.

use std::fmt;

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;

use crate::config::AuthorizationConfig;

use super::PolicyError;

/// How a caller proves identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Via {
    #[default]
    Unset,
    AccessToken,
}

/// Where the access token is carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenSource {
    #[default]
    Unset,
    Header,
    Cookie,
}

/// What the gate does with the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Policy {
    #[default]
    Unset,
    Allowed,
    Permitted,
    Enforced,
    Forbidden,
    Custom,
    Partner,
}

/// Resolved authorization triple for one route. Each field inherits from
/// the parent route independently when left unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Authorization {
    pub via: Via,
    pub from: TokenSource,
    pub policy: Policy,
}

impl Authorization {
    pub fn parse(cfg: &AuthorizationConfig) -> Result<Self, PolicyError> {
        let via = match cfg.via.as_deref() {
            None => Via::Unset,
            Some("token") => Via::AccessToken,
            Some(other) => return Err(PolicyError::UnknownVia(other.to_string())),
        };

        let from = match cfg.from.as_deref() {
            None => TokenSource::Unset,
            Some("header") => TokenSource::Header,
            Some("cookie") => TokenSource::Cookie,
            Some(other) => return Err(PolicyError::UnknownFrom(other.to_string())),
        };

        let policy = match cfg.policy.as_deref() {
            None => Policy::Unset,
            Some("allowed") => Policy::Allowed,
            Some("permitted") => Policy::Permitted,
            Some("enforced") => Policy::Enforced,
            Some("forbidden") => Policy::Forbidden,
            Some("custom") => Policy::Custom,
            Some("partner") => Policy::Partner,
            Some(other) => return Err(PolicyError::UnknownPolicy(other.to_string())),
        };

        Ok(Self { via, from, policy })
    }

    /// Fill every unset field from the parent's resolved value.
    pub fn inherit_unset(&mut self, parent: &Self) {
        if self.via == Via::Unset {
            self.via = parent.via;
        }

        if self.from == TokenSource::Unset {
            self.from = parent.from;
        }

        if self.policy == Policy::Unset {
            self.policy = parent.policy;
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.policy == Policy::Unset {
            return Err(PolicyError::MissingPolicy);
        }

        if matches!(self.policy, Policy::Permitted | Policy::Enforced) {
            if self.from == TokenSource::Unset {
                return Err(PolicyError::MissingFrom);
            }

            if self.via == Via::Unset {
                return Err(PolicyError::MissingVia);
            }
        }

        Ok(())
    }
}

impl fmt::Display for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let via = match self.via {
            Via::Unset => "unset",
            Via::AccessToken => "access token",
        };
        let from = match self.from {
            TokenSource::Unset => "unset",
            TokenSource::Header => "header",
            TokenSource::Cookie => "cookie",
        };
        let policy = match self.policy {
            Policy::Unset => "unset",
            Policy::Allowed => "allowed",
            Policy::Permitted => "permitted",
            Policy::Enforced => "enforced",
            Policy::Forbidden => "forbidden",
            Policy::Custom => "custom",
            Policy::Partner => "partner",
        };

        write!(f, "(via: {via}, from: {from}, policy: {policy})")
    }
}

/// `Authorization: Bearer <token>` — exactly two space-separated parts,
/// the token is the second.
pub fn token_from_header(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split(' ');

    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(token), None) if !token.is_empty() => Some(token.to_string()),
        _ => None,
    }
}

/// Raw value of the named session cookie.
pub fn token_from_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(COOKIE) {
        let Ok(value) = value.to_str() else { continue };

        for pair in value.split(';') {
            let Some((k, v)) = pair.trim().split_once('=') else {
                continue;
            };

            if k == name && !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    None
}
