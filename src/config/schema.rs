//! Route document schema.
//!
//! The YAML tree that drives the route index. All types derive Serde
//! traits; every policy field is optional so that unset fields can inherit
//! from the parent route during resolution.

use serde::Deserialize;
use std::time::Duration;

/// Top-level route document: a list of root route nodes.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RouteDocument {
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// One node of the route tree.
///
/// `prefix` is joined onto the parent's absolute path; everything else is
/// an override over the parent's resolved route.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub prefix: String,

    /// Absolute backend URL. Inherited when unset.
    #[serde(default)]
    pub target: Option<String>,

    /// Absolute upstream path replacing the matched prefix. Inherited when unset.
    #[serde(default)]
    pub rewrite: Option<String>,

    #[serde(default)]
    pub authorization: Option<AuthorizationConfig>,

    #[serde(default)]
    pub cors: Option<CorsConfig>,

    #[serde(default, rename = "rateLimit")]
    pub rate_limit: Option<RateLimitConfig>,

    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Authorization override block. Fields inherit independently.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthorizationConfig {
    #[serde(default)]
    pub via: Option<String>,

    #[serde(default)]
    pub from: Option<String>,

    #[serde(default)]
    pub policy: Option<String>,
}

/// CORS override block.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CorsConfig {
    #[serde(default)]
    pub enabled: Option<bool>,

    #[serde(default)]
    pub only_preflight: Option<bool>,

    #[serde(default)]
    pub allow_credentials: Option<bool>,

    #[serde(default)]
    pub allowed_origins: Option<Vec<String>>,

    #[serde(default)]
    pub allowed_headers: Option<Vec<String>>,

    #[serde(default)]
    pub allowed_methods: Option<Vec<String>>,

    #[serde(default)]
    pub exposed_headers: Option<Vec<String>>,
}

/// Rate-limit override block. `duration` accepts humantime strings ("1m").
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: Option<bool>,

    #[serde(default)]
    pub limit: Option<u64>,

    #[serde(default, with = "humantime_serde::option")]
    pub duration: Option<Duration>,
}
