//! Route resolution and longest-prefix matching.

use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::config::{RouteConfig, RouteDocument};
use crate::security::{Authorization, Cors, PolicyError, RateLimit};

use super::trie::PathTrie;

/// A fully resolved route: its own prefix joined onto all ancestors,
/// with every unset policy field replaced by the parent's resolved value.
/// Immutable once the index is built.
#[derive(Debug, Clone)]
pub struct Route {
    pub prefix: String,
    pub absolute: String,
    pub target: Option<Url>,
    pub rewrite: String,
    pub authorization: Authorization,
    pub cors: Cors,
    pub rate_limit: RateLimit,
}

impl Route {
    #[cfg(test)]
    pub(crate) fn stub(absolute: &str) -> Self {
        Self {
            prefix: absolute.to_string(),
            absolute: absolute.to_string(),
            target: None,
            rewrite: String::new(),
            authorization: Authorization::default(),
            cors: Cors::default(),
            rate_limit: RateLimit::default(),
        }
    }
}

/// Outcome of a successful match: the resolved route plus the upstream
/// path after applying its rewrite rule.
#[derive(Debug, Clone)]
pub struct Match {
    pub path: String,
    pub route: Arc<Route>,
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("failed to decode route document: {0}")]
    Document(#[from] serde_yaml::Error),

    #[error("route {prefix:?}: target URL is invalid: {source}")]
    Target {
        prefix: String,
        #[source]
        source: url::ParseError,
    },

    #[error("route {prefix:?} is invalid: {source}")]
    Invalid {
        prefix: String,
        #[source]
        source: PolicyError,
    },

    #[error("route {prefix:?} is already mapped")]
    Duplicate { prefix: String },
}

/// The immutable route index shared by all request handlers.
#[derive(Debug)]
pub struct RouteIndex {
    trie: PathTrie,
}

impl RouteIndex {
    /// Parse a YAML route document and build the index.
    pub fn parse(document: &str) -> Result<Self, RouteError> {
        let doc: RouteDocument = serde_yaml::from_str(document)?;
        Self::from_document(&doc)
    }

    pub fn from_document(doc: &RouteDocument) -> Result<Self, RouteError> {
        let mut trie = PathTrie::default();
        add_routes(&mut trie, "/", None, &doc.routes)?;
        Ok(Self { trie })
    }

    /// Longest-prefix match.
    ///
    /// Walks every route along `path` root-to-leaf and keeps the deepest
    /// one with a resolved target. Returns the route together with the
    /// upstream path: the request path itself when the route carries no
    /// rewrite, otherwise the rewrite joined onto the unmatched remainder
    /// with exactly one slash between them.
    pub fn match_path(&self, path: &str) -> Option<Match> {
        let mut found: Option<&Arc<Route>> = None;

        self.trie.walk_path(path, |route| {
            if route.target.is_some() {
                found = Some(route);
            }
        });

        let route = Arc::clone(found?);
        let matched_len = route.absolute.len().min(path.len());

        let upstream_path = if route.rewrite.is_empty() {
            path.to_string()
        } else {
            single_joining_slash(&route.rewrite, &path[matched_len..])
        };

        Some(Match {
            path: upstream_path,
            route,
        })
    }
}

/// Join the parent's absolute prefix and a child prefix with normalized
/// separators: single slashes, no trailing slash except for the root.
fn join_prefix(parent: &str, child: &str) -> String {
    let mut joined = String::with_capacity(parent.len() + child.len() + 1);
    joined.push_str(parent.trim_end_matches('/'));

    for seg in child.split('/').filter(|s| !s.is_empty()) {
        joined.push('/');
        joined.push_str(seg);
    }

    if joined.is_empty() {
        joined.push('/');
    }

    joined
}

/// Exactly one `/` between `a` and `b`; `b == ""` leaves `a` untouched so
/// a trailing slash on the rewrite survives only for exact-prefix hits.
fn single_joining_slash(a: &str, b: &str) -> String {
    let a_slash = a.ends_with('/');
    let b_slash = b.starts_with('/');

    match (b.is_empty(), a_slash, b_slash) {
        (true, _, _) => a.to_string(),
        (false, true, true) => format!("{}{}", a, &b[1..]),
        (false, false, false) => format!("{}/{}", a, b),
        _ => format!("{}{}", a, b),
    }
}

fn add_routes(
    trie: &mut PathTrie,
    parent_path: &str,
    parent: Option<&Route>,
    nodes: &[RouteConfig],
) -> Result<(), RouteError> {
    for node in nodes {
        if node.prefix.is_empty() {
            continue;
        }

        let absolute = join_prefix(parent_path, &node.prefix);

        let target = match &node.target {
            Some(raw) => Some(Url::parse(raw).map_err(|source| RouteError::Target {
                prefix: node.prefix.clone(),
                source,
            })?),
            None => None,
        };

        let authorization = match &node.authorization {
            Some(cfg) => Authorization::parse(cfg).map_err(|source| RouteError::Invalid {
                prefix: node.prefix.clone(),
                source,
            })?,
            None => Authorization::default(),
        };

        let mut cors = parent.map(|p| p.cors.clone()).unwrap_or_default();
        if let Some(cfg) = &node.cors {
            cors.overlay(cfg).map_err(|source| RouteError::Invalid {
                prefix: node.prefix.clone(),
                source,
            })?;
        }

        let mut rate_limit = parent.map(|p| p.rate_limit).unwrap_or_default();
        if let Some(cfg) = &node.rate_limit {
            rate_limit.overlay(cfg);
        }

        let mut route = Route {
            prefix: node.prefix.clone(),
            absolute: absolute.clone(),
            target,
            rewrite: node.rewrite.clone().unwrap_or_default(),
            authorization,
            cors,
            rate_limit,
        };

        if let Some(parent) = parent {
            if route.target.is_none() {
                route.target = parent.target.clone();
            }

            if route.rewrite.is_empty() {
                route.rewrite = parent.rewrite.clone();
            }

            route.authorization.inherit_unset(&parent.authorization);
        }

        route
            .authorization
            .validate()
            .and_then(|_| route.cors.validate())
            .and_then(|_| route.rate_limit.validate())
            .map_err(|source| RouteError::Invalid {
                prefix: node.prefix.clone(),
                source,
            })?;

        let shared = Arc::new(route);

        if !trie.put(&absolute, Arc::clone(&shared)) {
            return Err(RouteError::Duplicate { prefix: absolute });
        }

        add_routes(trie, &absolute, Some(&shared), &node.routes)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Policy;

    fn index(yaml: &str) -> RouteIndex {
        RouteIndex::parse(yaml).unwrap()
    }

    #[test]
    fn matches_longest_targeted_prefix() {
        let idx = index(
            r#"
routes:
  - prefix: /api
    target: http://a
    authorization: { policy: allowed }
    routes:
      - prefix: /v1
        target: http://b
"#,
        );

        let m = idx.match_path("/api/v1/users").unwrap();
        assert_eq!(m.route.target.as_ref().unwrap().as_str(), "http://b/");
        assert_eq!(m.path, "/api/v1/users");

        let m = idx.match_path("/api/other").unwrap();
        assert_eq!(m.route.target.as_ref().unwrap().as_str(), "http://a/");
    }

    #[test]
    fn no_target_anywhere_is_no_match() {
        let idx = index(
            r#"
routes:
  - prefix: /dark
    authorization: { policy: allowed }
"#,
        );
        assert!(idx.match_path("/dark/x").is_none());
        assert!(idx.match_path("/unknown").is_none());
    }

    #[test]
    fn rewrite_replaces_matched_prefix() {
        let idx = index(
            r#"
routes:
  - prefix: /api
    target: http://u
    authorization: { policy: allowed }
    routes:
      - prefix: /v1
        rewrite: /
"#,
        );

        let m = idx.match_path("/api/v1/x").unwrap();
        assert_eq!(m.path, "/x");
    }

    #[test]
    fn rewrite_on_exact_hit_keeps_rewrite_path() {
        let idx = index(
            r#"
routes:
  - prefix: /svc
    target: http://u
    rewrite: /internal/
    authorization: { policy: allowed }
"#,
        );

        let m = idx.match_path("/svc").unwrap();
        assert_eq!(m.path, "/internal/");
    }

    #[test]
    fn empty_rewrite_is_identity() {
        let idx = index(
            r#"
routes:
  - prefix: /api
    target: http://u
    authorization: { policy: allowed }
"#,
        );
        let m = idx.match_path("/api/deep/path").unwrap();
        assert_eq!(m.path, "/api/deep/path");
    }

    #[test]
    fn authorization_inherits_per_field() {
        let idx = index(
            r#"
routes:
  - prefix: /api
    target: http://u
    authorization: { via: token, from: header, policy: enforced }
    routes:
      - prefix: /public
        authorization: { policy: allowed }
      - prefix: /private
"#,
        );

        let public = idx.match_path("/api/public/x").unwrap();
        assert_eq!(public.route.authorization.policy, Policy::Allowed);

        let private = idx.match_path("/api/private/x").unwrap();
        assert_eq!(private.route.authorization.policy, Policy::Enforced);
    }

    #[test]
    fn rate_limit_inherited_verbatim_unless_overridden() {
        let idx = index(
            r#"
routes:
  - prefix: /api
    target: http://u
    authorization: { policy: allowed }
    rateLimit: { enabled: true, limit: 5, duration: 1m }
    routes:
      - prefix: /bulk
        rateLimit: { limit: 50 }
"#,
        );

        let base = idx.match_path("/api/x").unwrap();
        assert_eq!(base.route.rate_limit.limit, 5);

        let bulk = idx.match_path("/api/bulk/x").unwrap();
        assert!(bulk.route.rate_limit.enabled);
        assert_eq!(bulk.route.rate_limit.limit, 50);
        assert_eq!(bulk.route.rate_limit.duration, std::time::Duration::from_secs(60));
    }

    #[test]
    fn duplicate_prefixes_rejected() {
        let err = RouteIndex::parse(
            r#"
routes:
  - prefix: /api
    target: http://a
    authorization: { policy: allowed }
  - prefix: /api
    target: http://b
    authorization: { policy: allowed }
"#,
        )
        .unwrap_err();

        assert!(matches!(err, RouteError::Duplicate { .. }));
    }

    #[test]
    fn unknown_policy_string_is_fatal() {
        let err = RouteIndex::parse(
            r#"
routes:
  - prefix: /api
    target: http://a
    authorization: { policy: sometimes }
"#,
        )
        .unwrap_err();

        assert!(matches!(err, RouteError::Invalid { .. }));
    }

    #[test]
    fn missing_policy_is_fatal() {
        let err = RouteIndex::parse(
            r#"
routes:
  - prefix: /api
    target: http://a
"#,
        )
        .unwrap_err();

        assert!(matches!(err, RouteError::Invalid { .. }));
    }

    #[test]
    fn empty_prefix_children_are_skipped() {
        let idx = index(
            r#"
routes:
  - prefix: /api
    target: http://u
    authorization: { policy: allowed }
    routes:
      - prefix: ""
        target: http://ghost
"#,
        );

        let m = idx.match_path("/api/x").unwrap();
        assert_eq!(m.route.target.as_ref().unwrap().as_str(), "http://u/");
    }

    #[test]
    fn single_joining_slash_cases() {
        assert_eq!(single_joining_slash("/a", "b"), "/a/b");
        assert_eq!(single_joining_slash("/a/", "/b"), "/a/b");
        assert_eq!(single_joining_slash("/a", "/b"), "/a/b");
        assert_eq!(single_joining_slash("/a/", "b"), "/a/b");
        assert_eq!(single_joining_slash("/a/", ""), "/a/");
        assert_eq!(single_joining_slash("/a", ""), "/a");
    }
}
