//! CDN cache signalling.
//!
//! Handlers talk to the CDN through response headers:
//!
//! | Header | Request | Effect |
//! |---|---|---|
//! | `cache: a b` | anonymous GET | `Surrogate-Key: a b` |
//! | `uncache: a b` | any non-GET | purge tags `a`, `b` |
//! | neither / other | | `Cache-Control: private` |
//!
//! Only responses with a status in `[200, 400)` are touched.

mod purger;
mod signal;

pub use purger::{CachePurger, FASTLY_API_URL, FastlyPurger, MemoryPurger};
pub use signal::{
    CACHE_HEADER, CacheSignal, SURROGATE_KEY_HEADER, UNCACHE_HEADER, normalize_tags, signal,
};
