//! Dynamic CORS origin gate.
//!
//! The allowed-origin set is built once at startup from configuration and
//! never mutated afterwards, so authorization is a pure function of
//! (set, request origin) for the lifetime of the process. The same set
//! drives both the global CORS layer and the uploads route, which bypasses
//! the generic layer and applies decisions itself.

use http::header::{HeaderName, HeaderValue};
use http::Method;
use std::collections::HashSet;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Wildcard marker meaning "any origin".
pub const ANY_ORIGIN: &str = "*";

/// Methods advertised on cross-origin responses.
pub const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";

/// Request headers advertised on cross-origin responses.
pub const ALLOWED_HEADERS: &str =
    "Origin, X-Requested-With, Content-Type, Accept, Authorization";

/// Immutable set of origins permitted to make credentialed cross-origin
/// requests.
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: HashSet<String>,
    any: bool,
}

/// Outcome of authorizing a request origin against the allowed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    /// Reflect the literal requesting origin and mark `Vary: Origin`.
    Mirror(HeaderValue),
    /// Emit the `*` wildcard (only possible when no origin was sent).
    Any,
    /// Same-origin or non-browser request: permit without CORS headers.
    Skip,
    /// Origin not in the allowed set: emit no CORS headers.
    Deny,
}

impl AllowedOrigins {
    /// Build the set from configured origin strings. The `*` marker enables
    /// wildcard mode, as does an empty list.
    pub fn new<I>(configured: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut origins: HashSet<String> = configured
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        let any = origins.remove(ANY_ORIGIN) || origins.is_empty();
        Self { origins, any }
    }

    /// Whether the set is in wildcard mode.
    pub fn is_any(&self) -> bool {
        self.any
    }

    /// Exact, case-sensitive membership test (scheme, host and port must all
    /// match; no subdomain wildcarding).
    pub fn permits(&self, origin: &str) -> bool {
        self.any || self.origins.contains(origin)
    }

    /// Authorize a request's `Origin` header value.
    ///
    /// Requests without an origin are always permitted. When an origin is
    /// present and allowed, the literal origin is mirrored back rather than
    /// `*`, since credentialed requests are rejected by browsers when paired
    /// with a wildcard allow-origin.
    pub fn authorize(&self, origin: Option<&str>) -> OriginDecision {
        match origin {
            None => {
                if self.any {
                    OriginDecision::Any
                } else {
                    OriginDecision::Skip
                }
            }
            Some(origin) if self.permits(origin) => match HeaderValue::from_str(origin) {
                Ok(value) => OriginDecision::Mirror(value),
                Err(_) => OriginDecision::Deny,
            },
            Some(_) => OriginDecision::Deny,
        }
    }
}

/// Build the application-wide CORS layer backed by the allowed-origin set.
///
/// Origins are matched through a predicate so the layer reflects the literal
/// requesting origin, which keeps `allow_credentials(true)` interoperable
/// even in wildcard mode. The layer adds `Vary: Origin` itself.
pub fn cors_layer(allowed_origins: AllowedOrigins) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            origin
                .to_str()
                .map(|origin| allowed_origins.permits(origin))
                .unwrap_or(false)
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            http::header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            http::header::CONTENT_TYPE,
            http::header::ACCEPT,
            http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}
