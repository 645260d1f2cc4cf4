//! CORS policy block.
//!
//! Preflight probes (`OPTIONS` carrying `Access-Control-Request-Method`)
//! are answered by the gateway itself; actual cross-origin requests only
//! get their response decorated. Header names are matched in canonical
//! form, origins case-insensitively, methods upper-cased against a fixed
//! recognized set.

use axum::http::header::{HeaderMap, HeaderValue, ORIGIN, VARY};
use axum::http::Method;

use crate::config::CorsConfig;

use super::PolicyError;

const ALLOW_ORIGIN: &str = "access-control-allow-origin";
const ALLOW_METHODS: &str = "access-control-allow-methods";
const ALLOW_HEADERS: &str = "access-control-allow-headers";
const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
const EXPOSE_HEADERS: &str = "access-control-expose-headers";
pub const REQUEST_METHOD: &str = "access-control-request-method";
pub const REQUEST_HEADERS: &str = "access-control-request-headers";

const RECOGNIZED_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

#[derive(Debug, Clone, Default)]
pub struct Cors {
    pub enabled: bool,
    pub only_preflight: bool,
    pub allow_credentials: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub exposed_headers: Vec<String>,
}

impl Cors {
    /// Apply a route's CORS block on top of the inherited value.
    pub fn overlay(&mut self, cfg: &CorsConfig) -> Result<(), PolicyError> {
        if let Some(enabled) = cfg.enabled {
            self.enabled = enabled;
        }

        if let Some(only) = cfg.only_preflight {
            self.only_preflight = only;
        }

        if self.only_preflight {
            self.enabled = false;
        }

        if let Some(credentials) = cfg.allow_credentials {
            self.allow_credentials = credentials;
        }

        if let Some(origins) = &cfg.allowed_origins {
            self.allowed_origins = Vec::with_capacity(origins.len());

            for origin in origins {
                let origin = origin.trim();

                if origin != "*" && url::Url::parse(origin).is_err() {
                    return Err(PolicyError::InvalidOrigin(origin.to_string()));
                }

                self.allowed_origins.push(origin.to_ascii_lowercase());
            }
        }

        if let Some(names) = &cfg.allowed_headers {
            self.allowed_headers = names.iter().map(|h| canonical_header(h.trim())).collect();
        }

        if let Some(names) = &cfg.exposed_headers {
            self.exposed_headers = names.iter().map(|h| canonical_header(h.trim())).collect();
        }

        if let Some(methods) = &cfg.allowed_methods {
            self.allowed_methods = Vec::with_capacity(methods.len());

            for method in methods {
                let method = method.trim().to_ascii_uppercase();

                if !RECOGNIZED_METHODS.contains(&method.as_str()) {
                    return Err(PolicyError::UnknownMethod(method));
                }

                self.allowed_methods.push(method);
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if !self.enabled {
            return Ok(());
        }

        if self.allowed_headers.is_empty() {
            return Err(PolicyError::NoAllowedHeaders);
        }

        if self.allowed_methods.is_empty() {
            return Err(PolicyError::NoAllowedMethods);
        }

        if self.allowed_origins.is_empty() {
            return Err(PolicyError::NoAllowedOrigins);
        }

        Ok(())
    }

    /// Answer a preflight probe. Response headers go into `out`; returns
    /// whether the probe passed every check (→ 204, otherwise 403).
    pub fn handle_preflight(&self, request: &HeaderMap, out: &mut HeaderMap) -> bool {
        out.append(VARY, HeaderValue::from_static("Origin"));
        out.append(VARY, HeaderValue::from_static("Access-Control-Request-Method"));
        out.append(VARY, HeaderValue::from_static("Access-Control-Request-Headers"));

        let origin = header_str(request, ORIGIN.as_str());
        if origin.is_empty() || !self.is_origin_allowed(origin) {
            return false;
        }

        let requested_method = header_str(request, REQUEST_METHOD);
        if !self.is_method_allowed(requested_method) {
            return false;
        }

        let requested_headers = parse_header_list(header_str(request, REQUEST_HEADERS));
        if !self.are_headers_allowed(&requested_headers) {
            return false;
        }

        self.set_allow_origin(origin, out);

        set(out, ALLOW_METHODS, &requested_method.to_ascii_uppercase());

        if !requested_headers.is_empty() {
            set(out, ALLOW_HEADERS, &requested_headers.join(", "));
        }

        if self.allow_credentials {
            set(out, ALLOW_CREDENTIALS, "true");
        }

        true
    }

    /// Decorate the response to an actual (non-preflight) request. Never
    /// blocks; a disallowed origin or method simply gets no CORS headers.
    pub fn decorate_actual(&self, method: &Method, request: &HeaderMap, out: &mut HeaderMap) {
        out.append(VARY, HeaderValue::from_static("Origin"));

        let origin = header_str(request, ORIGIN.as_str());
        if origin.is_empty() || !self.is_origin_allowed(origin) {
            return;
        }

        if !self.is_method_allowed(method.as_str()) {
            return;
        }

        self.set_allow_origin(origin, out);

        if !self.exposed_headers.is_empty() {
            set(out, EXPOSE_HEADERS, &self.exposed_headers.join(", "));
        }

        if self.allow_credentials {
            set(out, ALLOW_CREDENTIALS, "true");
        }
    }

    fn set_allow_origin(&self, origin: &str, out: &mut HeaderMap) {
        if self.all_origins_allowed() {
            set(out, ALLOW_ORIGIN, "*");
        } else {
            set(out, ALLOW_ORIGIN, origin);
        }
    }

    fn all_origins_allowed(&self) -> bool {
        self.allowed_origins.len() == 1 && self.allowed_origins[0] == "*"
    }

    fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.all_origins_allowed() {
            return true;
        }

        let origin = origin.to_ascii_lowercase();
        self.allowed_origins.iter().any(|o| *o == origin)
    }

    fn is_method_allowed(&self, method: &str) -> bool {
        if self.allowed_methods.is_empty() {
            return false;
        }

        let method = method.to_ascii_uppercase();

        if method == Method::OPTIONS.as_str() {
            return true;
        }

        self.allowed_methods.iter().any(|m| *m == method)
    }

    fn are_headers_allowed(&self, requested: &[String]) -> bool {
        requested
            .iter()
            .all(|h| self.allowed_headers.iter().any(|allowed| allowed == h))
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> &'h str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

fn set(out: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        out.insert(name, value);
    }
}

/// Canonical header form: each `-`-separated part capitalized, the rest
/// lowered (`content-type` → `Content-Type`).
pub fn canonical_header(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;

    for c in name.chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }

        upper = c == '-' || c == '_';
    }

    out
}

/// Parse a comma-separated header-name list into canonical form.
pub fn parse_header_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(canonical_header)
        .collect()
}
