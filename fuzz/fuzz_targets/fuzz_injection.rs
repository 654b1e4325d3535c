//! Fuzz testing for the request rewriting paths.
//!
//! Inbound requests are attacker-controlled. This target feeds arbitrary
//! query strings, bodies and cache tag headers through the same functions
//! the middleware uses, and checks that they:
//!
//! - Never panic on any input
//! - Leave exactly one identity value in a rewritten query string or form
//! - Always produce a JSON object when body injection succeeds
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_injection
//! cargo +nightly fuzz run fuzz_injection -- -max_total_time=60
//! ```

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use gateway_integration::cdn::normalize_tags;
use gateway_integration::config::BootstrapOptions;
use gateway_integration::middleware::inject::{inject_body, inject_form, inject_query};
use gateway_integration::middleware::LOGGED_USER_KEY;
use gateway_integration::{Config, RequestValidation};

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    path_and_query: &'a str,
    body: &'a [u8],
    tags: &'a str,
    options: &'a [u8],
}

fn validation() -> RequestValidation {
    serde_json::from_value(serde_json::json!({
        "user": {"id": "u1", "name": "fuzz", "role": "USER", "provider": "local"}
    }))
    .unwrap()
}

fuzz_target!(|input: Input<'_>| {
    let validation = validation();

    if let Ok(uri) = input.path_and_query.parse() {
        if let Ok(rewritten) = inject_query(&uri, &validation) {
            let query = rewritten.query().unwrap_or_default();
            let count = url::form_urlencoded::parse(query.as_bytes())
                .filter(|(key, _)| key == LOGGED_USER_KEY)
                .count();
            assert_eq!(count, 1);
        }
    }

    if let Ok(bytes) = inject_form(input.body, &validation) {
        let count = url::form_urlencoded::parse(&bytes)
            .filter(|(key, _)| key == LOGGED_USER_KEY)
            .count();
        assert_eq!(count, 1);
    }

    if let Ok(bytes) = inject_body(input.body, &validation) {
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value.is_object());
    }

    for tag in normalize_tags(std::iter::once(input.tags)) {
        assert!(!tag.is_empty());
        assert!(!tag.contains(' '));
    }

    if let Ok(options) = serde_json::from_slice::<BootstrapOptions>(input.options) {
        let _ = Config::from_options(options);
    }
});
