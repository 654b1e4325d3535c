//! Inbound middleware.
//!
//! - **CORS**: origin mirroring with credentials ([`cors`])
//! - **Validation**: credential extraction and gateway resolution ([`validation`])
//! - **Injection**: identity into query string or JSON body ([`inject`])
//! - **Pipeline**: the composed tower layer ([`integration`])
//!
//! # Architecture
//!
//! ```text
//! Request → CORS → Skip check → Validate → Inject → Audit → Handler → Cache signal
//!                                   ↓         ↓        ↓
//!                              403 / passthrough / 500 error response
//! ```

pub mod cors;
pub mod inject;
pub mod integration;
pub mod validation;

pub use cors::cors_layer;
pub use inject::{LOGGED_USER_KEY, Placement, REQUEST_APPLICATION_KEY};
pub use integration::{IntegrationLayer, IntegrationService};
pub use validation::API_KEY_REQUIRED;
