mod api;
mod application;
mod identity;
mod validation;

pub use api::{EchoResponse, HealthResponse};
pub use application::{ApplicationAttributes, ApplicationData, ApplicationDescriptor};
pub use identity::{LoggedUser, MICROSERVICE_ID, MicroserviceIdentity, UserIdentity};
pub use validation::{RequestValidation, ValidationRequest};
