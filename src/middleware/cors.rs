//! CORS configuration applied in front of validation.
//!
//! The request origin is mirrored back and credentials are allowed, so
//! browsers can send cookies and `Authorization` across origins.

use axum::http::{HeaderName, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Only header allowed on cross-origin requests beyond the CORS-safelisted ones.
pub const UPGRADE_INSECURE_REQUESTS: &str = "upgrade-insecure-requests";

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::POST,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([HeaderName::from_static(UPGRADE_INSECURE_REQUESTS)])
}
