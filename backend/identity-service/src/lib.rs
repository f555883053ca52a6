/// Identity Service Library
///
/// Phone-number based accounts: registration, login with RS256 tokens, and
/// profile read and update.
///
/// ## Modules
///
/// - `config`: Service configuration
/// - `db`: Store contract and PostgreSQL implementation
/// - `error`: Error types
/// - `http`: HTTP routes, form binding and bearer token gate
/// - `models`: Data models and request forms
/// - `security`: Password hashing and JWT re-exports
/// - `services`: Identity workflow and background task dispatch
/// - `validators`: Input validation
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod security;
pub mod services;
pub mod validators;

// Re-export commonly used types
pub use error::{IdentityError, Result};
pub use http::{build_router, AppState};
pub use services::IdentityService;
