//! Uploaded-asset delivery route.
//!
//! Serves files from the upload directory under `/uploads`. Static delivery
//! bypasses the generic CORS layer, so the route applies the origin gate's
//! decision itself before delegating to the file-system service. It also
//! overrides the response content-type from the request path's extension,
//! since the default inference mis-maps some media containers.

use crate::cors::{AllowedOrigins, OriginDecision, ALLOWED_HEADERS, ALLOWED_METHODS};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        header::{
            HeaderMap, HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS,
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, ORIGIN, VARY,
        },
        Method, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Closed mapping from lowercase file extension to the content-type served
/// for it. Extensions outside this table fall back to the file provider's
/// own inference.
pub const CONTENT_TYPES: &[(&str, &str)] = &[
    // Video files
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("ogg", "video/ogg"),
    ("mov", "video/quicktime"),
    // Image files
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    // Document files
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
];

const CROSS_ORIGIN_RESOURCE_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-resource-policy");
const CROSS_ORIGIN_EMBEDDER_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-embedder-policy");

/// State shared by the uploads route.
#[derive(Debug, Clone)]
pub struct UploadsState {
    /// Origin gate, shared with the global CORS layer.
    pub allowed_origins: AllowedOrigins,

    /// Root directory files are served from.
    pub root: PathBuf,
}

/// Build the `/uploads` router with its own state so it stays independent of
/// the rest of the application (and of the database).
pub fn uploads_router(allowed_origins: AllowedOrigins, root: PathBuf) -> Router {
    let state = Arc::new(UploadsState {
        allowed_origins,
        root,
    });

    Router::new()
        .route("/uploads", any(serve_asset))
        .route("/uploads/{*path}", any(serve_asset))
        .with_state(state)
}

/// Resolve the content-type override for a request path: text after the
/// last `.`, lowercased, looked up in [`CONTENT_TYPES`].
pub fn content_type_for_path(path: &str) -> Option<&'static str> {
    let (_, ext) = path.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    CONTENT_TYPES
        .iter()
        .find_map(|&(candidate, content_type)| (candidate == ext).then_some(content_type))
}

/// Serve a single uploaded asset.
///
/// Applies CORS headers, answers preflight requests directly, and otherwise
/// delegates path resolution and byte streaming to a `ServeDir` rooted at
/// the upload directory. Missing files and delegation faults both surface
/// as a plain-text 404.
async fn serve_asset(State(state): State<Arc<UploadsState>>, req: Request) -> Response {
    let origin = req
        .headers()
        .get(ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());
    let decision = state.allowed_origins.authorize(origin.as_deref());

    // Preflight requests are answered here; file lookup never runs for them.
    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        apply_cors_headers(response.headers_mut(), &decision);
        return response;
    }

    // The route is mounted at /uploads; the file provider expects paths
    // relative to the upload directory.
    let full_path = req.uri().path();
    let relative = match full_path.strip_prefix("/uploads") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => "/".to_string(),
    };
    let content_type = content_type_for_path(&relative);

    let (mut parts, body) = req.into_parts();
    parts.uri = relative
        .parse::<Uri>()
        .unwrap_or_else(|_| Uri::from_static("/"));
    let inner_req = Request::from_parts(parts, body);

    let mut serve_dir = ServeDir::new(&state.root);
    let mut response = match serve_dir.try_call(inner_req).await {
        Ok(res) if res.status() == StatusCode::NOT_FOUND => {
            tracing::error!(path = %relative, "asset not found");
            not_found()
        }
        Ok(res) => {
            let mut res = res.map(Body::new);
            if let Some(content_type) = content_type {
                res.headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
            res
        }
        Err(err) => {
            tracing::error!(error = %err, path = %relative, "static file serving error");
            not_found()
        }
    };

    apply_cors_headers(response.headers_mut(), &decision);
    response
}

/// Plain-text 404; delegation faults map here too so the client cannot tell
/// a missing file from an internal failure.
fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "File not found").into_response()
}

/// Apply the origin gate's decision plus the fixed cross-origin headers.
fn apply_cors_headers(headers: &mut HeaderMap, decision: &OriginDecision) {
    match decision {
        OriginDecision::Mirror(origin) => {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            headers.append(VARY, HeaderValue::from_static("Origin"));
        }
        OriginDecision::Any => {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        }
        // Same-origin requests need no reflection; denied origins get no
        // CORS headers at all but the request is still served.
        OriginDecision::Skip | OriginDecision::Deny => {}
    }

    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        CROSS_ORIGIN_RESOURCE_POLICY,
        HeaderValue::from_static("cross-origin"),
    );
    headers.insert(
        CROSS_ORIGIN_EMBEDDER_POLICY,
        HeaderValue::from_static("unsafe-none"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_router(origins: &[&str], dir: &TempDir) -> Router {
        let allowed = AllowedOrigins::new(origins.iter().map(|s| s.to_string()));
        uploads_router(allowed, dir.path().to_path_buf())
    }

    fn get(path: &str, origin: Option<&str>) -> Request {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(origin) = origin {
            builder = builder.header(ORIGIN, origin);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    #[test]
    fn test_content_type_table_exact_mappings() {
        let expected = [
            ("mp4", "video/mp4"),
            ("webm", "video/webm"),
            ("ogg", "video/ogg"),
            ("mov", "video/quicktime"),
            ("jpg", "image/jpeg"),
            ("jpeg", "image/jpeg"),
            ("png", "image/png"),
            ("gif", "image/gif"),
            ("webp", "image/webp"),
            ("avif", "image/avif"),
            ("pdf", "application/pdf"),
            ("doc", "application/msword"),
            (
                "docx",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ),
        ];

        assert_eq!(CONTENT_TYPES.len(), expected.len());
        for (ext, content_type) in expected {
            assert_eq!(
                content_type_for_path(&format!("/file.{}", ext)),
                Some(content_type),
                "extension {} mis-mapped",
                ext
            );
        }
    }

    #[test]
    fn test_content_type_lookup_is_case_insensitive() {
        assert_eq!(content_type_for_path("/VIDEO.MP4"), Some("video/mp4"));
        assert_eq!(content_type_for_path("/photo.JPeG"), Some("image/jpeg"));
    }

    #[test]
    fn test_content_type_lookup_misses() {
        assert_eq!(content_type_for_path("/archive.zip"), None);
        assert_eq!(content_type_for_path("/no-extension"), None);
        assert_eq!(content_type_for_path("/dir.d/file"), None);
    }

    #[test]
    fn test_content_type_uses_last_extension() {
        assert_eq!(content_type_for_path("/clip.tar.mp4"), Some("video/mp4"));
    }

    #[tokio::test]
    async fn test_allowed_origin_gets_file_with_mirrored_headers() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("video.webm"), b"webm-bytes").unwrap();
        let router = test_router(&["https://app.example.com"], &dir);

        let response = router
            .oneshot(get("/uploads/video.webm", Some("https://app.example.com")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "video/webm"
        );
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://app.example.com"
        );
        let vary: Vec<_> = response.headers().get_all(VARY).iter().collect();
        assert!(vary.iter().any(|v| v.as_bytes() == b"Origin"));
        assert_eq!(body_bytes(response).await, b"webm-bytes");
    }

    #[tokio::test]
    async fn test_mp4_content_type_overrides_provider_inference() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("clip.mp4"), b"not really video").unwrap();
        let router = test_router(&["*"], &dir);

        let response = router
            .oneshot(get("/uploads/clip.mp4", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "video/mp4");
    }

    #[tokio::test]
    async fn test_missing_asset_returns_plain_text_404() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&["*"], &dir);

        let response = router
            .oneshot(get("/uploads/does-not-exist.png", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/plain"));
        let body = body_bytes(response).await;
        assert!(!body.is_empty());
        assert_eq!(body, b"File not found");
    }

    #[tokio::test]
    async fn test_options_preflight_short_circuits() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("photo.png"), b"png-bytes").unwrap();
        let router = test_router(&["https://app.example.com"], &dir);

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/uploads/photo.png")
            .header(ORIGIN, "https://app.example.com")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(ACCESS_CONTROL_ALLOW_METHODS)
                .unwrap(),
            ALLOWED_METHODS
        );
        // Empty body even though the file exists: lookup never ran.
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_denied_origin_still_served_without_allow_origin() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("photo.png"), b"png-bytes").unwrap();
        let router = test_router(&["http://localhost:3000"], &dir);

        let response = router
            .oneshot(get("/uploads/photo.png", Some("https://evil.example.com")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
        // The fixed headers are still present.
        assert_eq!(
            response
                .headers()
                .get(ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_no_origin_with_wildcard_set_emits_literal_wildcard() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("doc.pdf"), b"%PDF").unwrap();
        let router = test_router(&["*"], &dir);

        let response = router.oneshot(get("/uploads/doc.pdf", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_cross_origin_embedding_headers_on_every_response() {
        let dir = TempDir::new().unwrap();
        let router = test_router(&["*"], &dir);

        // Even the 404 path carries the embedding headers.
        let response = router
            .oneshot(get("/uploads/missing.gif", Some("https://any.example.com")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response
                .headers()
                .get(CROSS_ORIGIN_RESOURCE_POLICY)
                .unwrap(),
            "cross-origin"
        );
        assert_eq!(
            response
                .headers()
                .get(CROSS_ORIGIN_EMBEDDER_POLICY)
                .unwrap(),
            "unsafe-none"
        );
        assert_eq!(
            response
                .headers()
                .get(ACCESS_CONTROL_ALLOW_HEADERS)
                .unwrap(),
            ALLOWED_HEADERS
        );
    }

    #[tokio::test]
    async fn test_nested_paths_resolve_under_upload_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("avatars")).unwrap();
        fs::write(dir.path().join("avatars/me.jpeg"), b"jpeg-bytes").unwrap();
        let router = test_router(&["*"], &dir);

        let response = router
            .oneshot(get("/uploads/avatars/me.jpeg", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "image/jpeg");
        assert_eq!(body_bytes(response).await, b"jpeg-bytes");
    }
}
