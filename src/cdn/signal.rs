use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use tracing::{debug, error, info};

use super::purger::CachePurger;
use crate::error::IntegrationResult;
use crate::metrics;

/// Response header a handler sets to have an anonymous GET cached.
pub const CACHE_HEADER: &str = "cache";

/// Response header a handler sets to purge tags after a write.
pub const UNCACHE_HEADER: &str = "uncache";

/// Header Fastly uses to tag cached objects.
pub const SURROGATE_KEY_HEADER: &str = "surrogate-key";

/// Split space-delimited tag values into individual tags.
///
/// Each input is one header value; values are concatenated in order and
/// empty fragments are dropped.
pub fn normalize_tags<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .flat_map(|value| value.split(' '))
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// What the signaler did to a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheSignal {
    /// Status outside `[200, 400)`; the response was left alone.
    Untouched,
    /// Anonymous GET tagged with `Surrogate-Key`.
    Tagged(String),
    /// `Cache-Control: private` set. `purged` holds the tags sent to the CDN,
    /// empty when no purge was requested.
    Private { purged: Vec<String> },
}

fn header_tags(headers: &HeaderMap, name: &str) -> Vec<String> {
    normalize_tags(
        headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok()),
    )
}

/// Apply the cache convention to a handler's response.
///
/// `authorized` is whether the inbound request carried a non-empty
/// `Authorization` header.
///
/// # Errors
///
/// Returns `IntegrationError::Cdn` if the purge call fails. The response
/// headers are left untouched in that case.
pub async fn signal(
    method: &Method,
    authorized: bool,
    status: StatusCode,
    headers: &mut HeaderMap,
    purger: &dyn CachePurger,
) -> IntegrationResult<CacheSignal> {
    if !(200..400).contains(&status.as_u16()) {
        debug!(status = status.as_u16(), "Skipping cache signal");
        metrics::record_cdn_decision("untouched");
        return Ok(CacheSignal::Untouched);
    }

    let mut purged = Vec::new();
    if *method != Method::GET {
        let tags = header_tags(headers, UNCACHE_HEADER);
        if !tags.is_empty() {
            info!(tags = %tags.join(" "), "Purging cache");
            metrics::record_cdn_decision("purge");
            purger
                .purge_keys(&tags)
                .await
                .inspect_err(|e| error!(error = %e, "Cache purge failed"))?;
            purged = tags;
        }
    }

    if *method == Method::GET && !authorized {
        let keys = header_tags(headers, CACHE_HEADER);
        if !keys.is_empty() {
            let joined = keys.join(" ");
            if let Ok(value) = HeaderValue::from_str(&joined) {
                info!(keys = %joined, "Caching response");
                headers.insert(HeaderName::from_static(SURROGATE_KEY_HEADER), value);
                metrics::record_cdn_decision("tagged");
                return Ok(CacheSignal::Tagged(joined));
            }
        }
    }

    headers.insert(CACHE_CONTROL, HeaderValue::from_static("private"));
    metrics::record_cdn_decision("private");
    Ok(CacheSignal::Private { purged })
}
