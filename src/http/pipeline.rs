//! The per-request gate pipeline.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use chrono::SecondsFormat;

use crate::error::{ErrorClass, GatewayError};
use crate::identity::IdentityExchanger;
use crate::observability::metrics;
use crate::proxy::Forwarder;
use crate::ratelimit::{RateRequest, RateState, Strategy};
use crate::routing::{Match, RouteIndex};
use crate::security::authorization::{token_from_cookie, token_from_header};
use crate::security::cors::REQUEST_METHOD;
use crate::security::rate_limit::{
    key_from_request, EXPIRES_AT_HEADER, STATE_HEADER, TOTAL_REQUESTS_HEADER,
};
use crate::security::{Policy, TokenSource, Via};

/// Explicitly wired dependencies shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteIndex>,
    pub limiter: Option<Arc<dyn Strategy>>,
    pub identity: Option<Arc<dyn IdentityExchanger>>,
    pub forwarder: Arc<Forwarder>,
    pub session_cookie: Arc<str>,
    pub welcome: Arc<str>,
}

/// Entry point for every dispatched request.
pub async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut req: Request<Body>,
) -> Response<Body> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = run_gates(&state, peer, &mut req).await;

    let response = match response {
        GateFlow::Terminal(response) => response,
        GateFlow::Forward(m, decorations) => {
            match state.forwarder.forward(&m, peer, req).await {
                Ok(mut response) => {
                    apply_decorations(&mut response, &decorations);
                    response
                }
                Err(e) => {
                    log_gateway_error(&e, &method, &path, peer);
                    error_response(&e, decorations)
                }
            }
        }
    };

    metrics::record_request(method.as_str(), &path, response.status().as_u16(), started);

    response
}

enum GateFlow {
    /// A gate answered the client; the pipeline is over.
    Terminal(Response<Body>),
    /// All gates passed; hand the request to the forwarder.
    Forward(Match, HeaderMap),
}

async fn run_gates(state: &AppState, peer: SocketAddr, req: &mut Request<Body>) -> GateFlow {
    if req.method() == Method::GET && req.uri().path() == "/" {
        return GateFlow::Terminal(welcome(&state.welcome));
    }

    let path = req.uri().path().to_string();
    let Some(m) = state.routes.match_path(&path) else {
        let e = GatewayError::RouteNotFound { path };
        return GateFlow::Terminal(error_response(&e, HeaderMap::new()));
    };

    // Response decorations accumulate across gates and ride on whatever
    // response ends this request, exactly as if they had been written to
    // the response head up front.
    let mut decorations = HeaderMap::new();

    if let Err(e) = rate_gate(state, &m, req.headers(), peer, &mut decorations).await {
        log_gateway_error(&e, req.method(), &path, peer);
        return GateFlow::Terminal(error_response(&e, decorations));
    }

    match cors_gate(&m, req, &mut decorations) {
        Ok(None) => {}
        Ok(Some(status)) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = status;
            apply_decorations(&mut response, &decorations);
            return GateFlow::Terminal(response);
        }
        Err(e) => {
            log_gateway_error(&e, req.method(), &path, peer);
            return GateFlow::Terminal(error_response(&e, decorations));
        }
    }

    if let Err(e) = authorization_gate(state, &m, req.headers_mut()).await {
        log_gateway_error(&e, req.method(), &path, peer);
        return GateFlow::Terminal(error_response(&e, decorations));
    }

    GateFlow::Forward(m, decorations)
}

/// Rate gate: resolves the caller key and asks the strategy. Telemetry
/// headers are set on every decision, allowed or denied.
async fn rate_gate(
    state: &AppState,
    m: &Match,
    headers: &HeaderMap,
    peer: SocketAddr,
    decorations: &mut HeaderMap,
) -> Result<(), GatewayError> {
    let Some(limiter) = &state.limiter else {
        return Ok(());
    };

    let limit = m.route.rate_limit;
    if !limit.enabled {
        return Ok(());
    }

    let key = key_from_request(headers, peer).map_err(GatewayError::RateKey)?;

    let decision = limiter
        .run(RateRequest {
            key,
            limit: limit.limit,
            duration: limit.duration,
        })
        .await
        .map_err(|e| GatewayError::Store(Box::new(e)))?;

    decorate(decorations, STATE_HEADER, decision.state.as_str());
    decorate(
        decorations,
        EXPIRES_AT_HEADER,
        &decision.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    decorate(
        decorations,
        TOTAL_REQUESTS_HEADER,
        &decision.total_requests.to_string(),
    );

    match decision.state {
        RateState::Allow => Ok(()),
        RateState::Deny => Err(GatewayError::RateLimited),
    }
}

/// CORS gate. A passing preflight terminates with the returned status;
/// failed probes surface as gateway errors like every other gate. Actual
/// requests only pick up response decorations.
fn cors_gate(
    m: &Match,
    req: &Request<Body>,
    decorations: &mut HeaderMap,
) -> Result<Option<StatusCode>, GatewayError> {
    let cors = &m.route.cors;

    let is_preflight = req.method() == Method::OPTIONS
        && req
            .headers()
            .get(REQUEST_METHOD)
            .is_some_and(|v| !v.is_empty());

    if is_preflight {
        if !cors.enabled && !cors.only_preflight {
            return Err(GatewayError::OptionsNotSupported);
        }

        if cors.handle_preflight(req.headers(), decorations) {
            return Ok(Some(StatusCode::NO_CONTENT));
        }

        return Err(GatewayError::CorsDenied);
    }

    if cors.enabled {
        cors.decorate_actual(req.method(), req.headers(), decorations);
    }

    Ok(None)
}

/// Authorization gate. May rewrite the outbound `Authorization` header.
async fn authorization_gate(
    state: &AppState,
    m: &Match,
    headers: &mut HeaderMap,
) -> Result<(), GatewayError> {
    let authz = &m.route.authorization;

    match authz.policy {
        // Upstream enforces its own scheme; pass through untouched.
        Policy::Custom | Policy::Partner => Ok(()),

        Policy::Allowed => {
            headers.remove(AUTHORIZATION);
            Ok(())
        }

        Policy::Forbidden => Err(GatewayError::Forbidden),

        // A validated route never carries this, but the gate stays closed
        // if one slips through.
        Policy::Unset => Err(GatewayError::Unauthorized),

        Policy::Permitted | Policy::Enforced => {
            let enforced = authz.policy == Policy::Enforced;

            if authz.via != Via::AccessToken {
                return Err(GatewayError::Unauthorized);
            }

            let token = match authz.from {
                TokenSource::Header => token_from_header(headers),
                TokenSource::Cookie => token_from_cookie(headers, &state.session_cookie),
                TokenSource::Unset => None,
            };

            // The caller's credential never travels upstream as-is.
            headers.remove(AUTHORIZATION);

            let Some(token) = token else {
                return if enforced {
                    Err(GatewayError::Unauthorized)
                } else {
                    Ok(())
                };
            };

            let Some(identity) = &state.identity else {
                return if enforced {
                    Err(GatewayError::Unauthorized)
                } else {
                    Ok(())
                };
            };

            match identity.exchange(&token).await {
                Ok(identity_token) => {
                    let bearer = format!("Bearer {identity_token}");

                    match HeaderValue::from_str(&bearer) {
                        Ok(value) => {
                            headers.insert(AUTHORIZATION, value);
                            Ok(())
                        }
                        Err(_) => Err(GatewayError::Unauthorized),
                    }
                }
                Err(_) if !enforced => Ok(()),
                Err(e) if e.is_invalid_session() => Err(GatewayError::Unauthorized),
                Err(e) => Err(GatewayError::IdentityUnavailable(Box::new(e))),
            }
        }
    }
}

fn welcome(body: &Arc<str>) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error_response(e: &GatewayError, decorations: HeaderMap) -> Response<Body> {
    let status = e.status();
    let body = status.canonical_reason().unwrap_or_default();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    apply_decorations(&mut response, &decorations);
    response
}

fn apply_decorations(response: &mut Response<Body>, decorations: &HeaderMap) {
    for (name, value) in decorations.iter() {
        response.headers_mut().append(name, value.clone());
    }
}

fn decorate(decorations: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        decorations.insert(name, value);
    }
}

fn log_gateway_error(e: &GatewayError, method: &Method, path: &str, peer: SocketAddr) {
    match e.class() {
        ErrorClass::Client => {
            tracing::debug!(method = %method, path = %path, remote = %peer, error = %e, "request blocked");
        }
        ErrorClass::Upstream | ErrorClass::Dependency => {
            tracing::error!(method = %method, path = %path, remote = %peer, error = %e, "request failed");
        }
    }
}
