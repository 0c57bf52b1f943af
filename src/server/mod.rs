//! Server side of the translation pipeline: request validation, the
//! cache-backed batch translator and its HTTP routes.

mod routes;
mod service;
mod validation;

pub use routes::{create_router, AppState};
pub use service::{BatchOutcome, TranslationService};
pub use validation::{validate, ValidatedRequest, ValidationError};
