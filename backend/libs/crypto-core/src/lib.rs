//! Shared cryptographic primitives for the identity backend.
//!
//! - `jwt`: RS256 identity tokens (issue / verify)
pub mod jwt;

pub use jwt::{Claims, JwtError, KeySource, TokenService};
