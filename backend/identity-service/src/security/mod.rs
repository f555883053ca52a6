/// Security primitives for identity-service
///
/// - **password**: Argon2id credential hashing and verification
/// - **crypto-core::jwt**: RS256 identity tokens (re-exported)
pub use crypto_core::jwt::{Claims, JwtError, KeySource, TokenService};

pub mod password;

pub use password::{hash_password, verify_password, DEFAULT_HASH_COST, MAX_PASSWORD_BYTES};
