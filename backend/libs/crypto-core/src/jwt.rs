/// RS256 identity tokens for the identity service
///
/// Tokens carry a deliberately small claim set: the numeric user id and the
/// expiry. They are minted at login and verified by the HTTP boundary before
/// any protected operation.
///
/// ## Security Design
///
/// - **RSA only**: tokens whose header names any non-RSA algorithm are rejected,
///   which closes the HS256/public-key confusion attack
/// - **No hardcoded keys**: key material comes from PEM strings or PEM files
/// - **Load once**: keys are parsed on first use (or eagerly via `preload`) and
///   are immutable for the lifetime of the `TokenService`
/// - **No revocation**: a token is valid until `exp`; rotating keys requires a
///   process restart
///
/// ## Usage
///
/// ```rust,no_run
/// use crypto_core::jwt::{KeySource, TokenService};
///
/// let tokens = TokenService::new(KeySource::Files {
///     private: "./rsakey/jwtrsa256.key".into(),
///     public: "./rsakey/jwtrsa256.key.pub".into(),
/// });
/// tokens.preload().expect("key material");
///
/// let token = tokens.issue(42, 60).expect("signed token");
/// assert_eq!(tokens.verify(&token).expect("valid token"), 42);
/// ```
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Lifetime applied when the caller passes a non-positive value
pub const DEFAULT_TOKEN_LIFETIME_MINUTES: i64 = 60;

/// Signing algorithm for every token this service issues
const JWT_ALGORITHM: Algorithm = Algorithm::RS256;

/// Algorithms accepted on verification (the RSA PKCS#1 family)
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum JwtError {
    /// Key material could not be read or parsed
    #[error("JWT key material error: {0}")]
    KeyMaterial(String),

    /// A token could not be produced
    #[error("JWT signing failed: {0}")]
    Signing(String),

    /// Malformed, wrongly signed, wrong algorithm, or expired
    #[error("Token validation failed: {0}")]
    InvalidToken(String),
}

pub type Result<T> = std::result::Result<T, JwtError>;

// ============================================================================
// Data Structures
// ============================================================================

/// Claims embedded in every identity token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject: the user's numeric id
    pub id: i64,
    /// Expiration time (Unix timestamp, seconds)
    pub exp: i64,
}

impl Claims {
    /// Claims for `subject_id` expiring `lifetime_minutes` from now
    ///
    /// Non-positive lifetimes fall back to [`DEFAULT_TOKEN_LIFETIME_MINUTES`].
    pub fn new(subject_id: i64, lifetime_minutes: i64) -> Self {
        let lifetime = if lifetime_minutes > 0 {
            lifetime_minutes
        } else {
            DEFAULT_TOKEN_LIFETIME_MINUTES
        };

        Self {
            id: subject_id,
            exp: (Utc::now() + Duration::minutes(lifetime)).timestamp(),
        }
    }
}

/// Where the RSA key pair comes from
#[derive(Clone)]
pub enum KeySource {
    /// PEM-encoded keys held in memory (e.g. from `JWT_PRIVATE_KEY`)
    Pem { private: String, public: String },
    /// Paths to PEM files, read on first use
    Files { private: PathBuf, public: PathBuf },
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Pem { .. } => f.write_str("KeySource::Pem { .. }"),
            KeySource::Files { private, public } => f
                .debug_struct("KeySource::Files")
                .field("private", private)
                .field("public", public)
                .finish(),
        }
    }
}

struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    fn load(source: &KeySource) -> Result<Self> {
        let (private_pem, public_pem) = match source {
            KeySource::Pem { private, public } => {
                (private.as_bytes().to_vec(), public.as_bytes().to_vec())
            }
            KeySource::Files { private, public } => (read_pem(private)?, read_pem(public)?),
        };

        let encoding = EncodingKey::from_rsa_pem(&private_pem)
            .map_err(|e| JwtError::KeyMaterial(format!("Failed to parse RSA private key: {e}")))?;
        let decoding = DecodingKey::from_rsa_pem(&public_pem)
            .map_err(|e| JwtError::KeyMaterial(format!("Failed to parse RSA public key: {e}")))?;

        Ok(Self { encoding, decoding })
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| JwtError::KeyMaterial(format!("Failed to read {}: {e}", path.display())))
}

// ============================================================================
// Token Service
// ============================================================================

/// Issues and verifies identity tokens
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct TokenService {
    source: KeySource,
    keys: OnceCell<JwtKeys>,
}

impl TokenService {
    pub fn new(source: KeySource) -> Self {
        Self {
            source,
            keys: OnceCell::new(),
        }
    }

    /// Load and parse the key pair now instead of on first use
    ///
    /// Services call this during startup so broken key material stops the
    /// process instead of failing the first login.
    pub fn preload(&self) -> Result<()> {
        self.keys().map(|_| ())
    }

    /// Concurrent first callers block on the same initialisation; only one
    /// of them reads the key files.
    fn keys(&self) -> Result<&JwtKeys> {
        self.keys.get_or_try_init(|| JwtKeys::load(&self.source))
    }

    /// Issue a token for `subject_id` valid for `lifetime_minutes`
    pub fn issue(&self, subject_id: i64, lifetime_minutes: i64) -> Result<String> {
        self.sign(&Claims::new(subject_id, lifetime_minutes))
    }

    /// Sign an explicit claim set
    pub fn sign(&self, claims: &Claims) -> Result<String> {
        let keys = self.keys().map_err(|e| JwtError::Signing(e.to_string()))?;

        encode(&Header::new(JWT_ALGORITHM), claims, &keys.encoding)
            .map_err(|e| JwtError::Signing(e.to_string()))
    }

    /// Verify a compact token and return the subject id it carries
    ///
    /// ## Errors
    ///
    /// - `InvalidToken` for malformed tokens, non-RSA algorithms, bad
    ///   signatures and passed expiry
    /// - `KeyMaterial` if the public key cannot be loaded
    pub fn verify(&self, token: &str) -> Result<i64> {
        Ok(self.decode(token)?.id)
    }

    /// Verify a compact token and return its full claim set
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let keys = self.keys()?;

        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<Claims>(token, &keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| JwtError::InvalidToken(e.to_string()))
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("source", &self.source)
            .field("loaded", &self.keys.get().is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
