mod echo;
mod health;

pub use echo::{EchoLimit, echo};
pub use health::healthcheck;
