//! Outbound side: the gateway validation call, microservice-to-microservice
//! requests, and registration.
//!
//! ```text
//! Middleware ──validate_request──▶ POST {gateway}/v1/request/validate
//! App code ──request_to_microservice──▶ {gateway}{uri}
//! Startup ──register_microservice──▶ POST {gateway}/api/v1/microservice
//! ```
//!
//! All three attach the microservice token as a bearer credential.

mod client;
mod request;

pub use client::{API_KEY_HEADER, APP_KEY_HEADER, GatewayClient, REGISTER_PATH, VALIDATE_PATH};
pub use request::{MicroserviceRequest, MicroserviceResponse, Registration};
