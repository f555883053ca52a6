/// Account workflow: registration, login and profile management
///
/// Business outcomes (phone number taken, unknown phone number, wrong
/// password) are returned as enum variants. Only infrastructure failures use
/// the error channel.
use crate::db::{UserStore, WriteOutcome};
use crate::error::{IdentityError, Result};
use crate::models::Identity;
use crate::security::{hash_password, verify_password, TokenService, DEFAULT_HASH_COST};
use crate::services::background::BackgroundTasks;
use crypto_core::jwt::DEFAULT_TOKEN_LIFETIME_MINUTES;
use futures_util::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_HASH_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for [`IdentityService`]
#[derive(Debug, Clone)]
pub struct IdentitySettings {
    /// Argon2 time cost for new hashes
    pub hash_cost: u32,
    pub token_lifetime_minutes: i64,
    /// Budget for each individual store call
    pub store_timeout: Duration,
    /// Budget for each hash or verify on the blocking pool
    pub hash_timeout: Duration,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            hash_cost: DEFAULT_HASH_COST,
            token_lifetime_minutes: DEFAULT_TOKEN_LIFETIME_MINUTES,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            hash_timeout: DEFAULT_HASH_TIMEOUT,
        }
    }
}

pub struct RegisterInput {
    pub phone_number: String,
    pub full_name: String,
    pub password: String,
}

pub struct LoginInput {
    pub phone_number: String,
    pub password: String,
}

/// Profile changes for user `id`; `None` or empty keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct UpdateProfileInput {
    pub id: i64,
    pub phone_number: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered { id: i64 },
    PhoneNumberExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated { id: i64, token: String },
    NotFound,
    WrongPassword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateProfileOutcome {
    Updated,
    PhoneNumberExists,
}

#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn UserStore>,
    tokens: Arc<TokenService>,
    tasks: Arc<dyn BackgroundTasks>,
    settings: IdentitySettings,
}

impl IdentityService {
    pub fn new(
        store: Arc<dyn UserStore>,
        tokens: Arc<TokenService>,
        tasks: Arc<dyn BackgroundTasks>,
        settings: IdentitySettings,
    ) -> Self {
        Self {
            store,
            tokens,
            tasks,
            settings,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create an account
    ///
    /// The password is hashed before the store is touched; a hashing failure
    /// is an internal error and nothing is written.
    pub async fn register(&self, input: RegisterInput) -> Result<RegisterOutcome> {
        let RegisterInput {
            phone_number,
            full_name,
            password,
        } = input;

        let cost = self.settings.hash_cost;
        let password_hash = self
            .with_hash_timeout(move || hash_password(&password, cost))
            .await?;

        let created = self
            .with_store_timeout(
                self.store
                    .create_user(&phone_number, &full_name, &password_hash),
            )
            .await?;

        match created {
            WriteOutcome::Applied(id) => {
                info!(user_id = id, phone = %mask_phone(&phone_number), "User registered");
                Ok(RegisterOutcome::Registered { id })
            }
            WriteOutcome::PhoneNumberTaken => {
                info!(phone = %mask_phone(&phone_number), "Registration rejected: phone number in use");
                Ok(RegisterOutcome::PhoneNumberExists)
            }
        }
    }

    /// Authenticate by phone number and password
    ///
    /// On success a token is issued and the login counter is bumped in the
    /// background; the counter never delays or fails the login.
    pub async fn login(&self, input: LoginInput) -> Result<LoginOutcome> {
        let LoginInput {
            phone_number,
            password,
        } = input;

        let credential = match self
            .with_store_timeout(self.store.find_credential_by_phone(&phone_number))
            .await?
        {
            Some(credential) => credential,
            None => {
                info!(phone = %mask_phone(&phone_number), "Login rejected: unknown phone number");
                return Ok(LoginOutcome::NotFound);
            }
        };

        let password_hash = credential.password_hash;
        let matches = self
            .with_hash_timeout(move || verify_password(&password, &password_hash))
            .await?;

        if !matches {
            warn!(user_id = credential.id, "Login rejected: wrong password");
            return Ok(LoginOutcome::WrongPassword);
        }

        let token = self
            .tokens
            .issue(credential.id, self.settings.token_lifetime_minutes)?;

        self.record_login(credential.id);

        info!(user_id = credential.id, "User logged in");
        Ok(LoginOutcome::Authenticated {
            id: credential.id,
            token,
        })
    }

    /// Read the identity of an authenticated user
    pub async fn get_profile(&self, id: i64) -> Result<Identity> {
        self.with_store_timeout(self.store.find_identity_by_id(id))
            .await?
            .ok_or(IdentityError::UserNotFound)
    }

    /// Merge supplied fields over the stored identity and persist the result
    pub async fn update_profile(&self, input: UpdateProfileInput) -> Result<UpdateProfileOutcome> {
        let current = self.get_profile(input.id).await?;

        let phone_number = non_empty(input.phone_number).unwrap_or(current.phone_number);
        let full_name = non_empty(input.full_name).unwrap_or(current.full_name);

        let updated = self
            .with_store_timeout(
                self.store
                    .update_identity(current.id, &phone_number, &full_name),
            )
            .await?;

        match updated {
            WriteOutcome::Applied(()) => {
                info!(user_id = current.id, "Profile updated");
                Ok(UpdateProfileOutcome::Updated)
            }
            WriteOutcome::PhoneNumberTaken => {
                info!(
                    user_id = current.id,
                    phone = %mask_phone(&phone_number),
                    "Profile update rejected: phone number in use"
                );
                Ok(UpdateProfileOutcome::PhoneNumberExists)
            }
        }
    }

    fn record_login(&self, user_id: i64) {
        let store = Arc::clone(&self.store);
        let budget = self.settings.store_timeout;

        self.tasks.spawn(
            async move {
                match timeout(budget, store.increment_login_count(user_id)).await {
                    Ok(Ok(())) => debug!(user_id, "Login count incremented"),
                    Ok(Err(e)) => error!(user_id, error = %e, "Failed to increment login count"),
                    Err(_) => error!(user_id, ?budget, "Login count increment timed out"),
                }
            }
            .boxed(),
        );
    }

    /// Run a hashing job on the blocking pool within `hash_timeout`
    ///
    /// On expiry the job is abandoned, not cancelled; it finishes on its
    /// blocking thread and its result is dropped.
    async fn with_hash_timeout<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let budget = self.settings.hash_timeout;
        timeout(budget, tokio::task::spawn_blocking(job))
            .await
            .map_err(|_| IdentityError::Timeout(budget))??
    }

    async fn with_store_timeout<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let budget = self.settings.store_timeout;
        timeout(budget, future)
            .await
            .map_err(|_| IdentityError::Timeout(budget))?
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Mask phone number for logging: `+62****5678`
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() <= 7 {
        return "****".to_string();
    }

    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}****{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockUserStore;
    use crate::models::Credential;
    use crypto_core::jwt::KeySource;
    use futures_util::future::BoxFuture;
    use mockall::predicate::eq;
    use std::sync::Mutex;

    const TEST_PRIVATE_KEY: &str = include_str!("../../tests/fixtures/jwtrsa256.key");
    const TEST_PUBLIC_KEY: &str = include_str!("../../tests/fixtures/jwtrsa256.key.pub");

    /// Holds spawned tasks so tests decide when (and whether) they run
    #[derive(Default)]
    struct RecordingTasks {
        spawned: Mutex<Vec<BoxFuture<'static, ()>>>,
    }

    impl RecordingTasks {
        fn count(&self) -> usize {
            self.spawned.lock().unwrap().len()
        }

        async fn run_all(&self) {
            let tasks: Vec<_> = self.spawned.lock().unwrap().drain(..).collect();
            for task in tasks {
                task.await;
            }
        }
    }

    impl BackgroundTasks for RecordingTasks {
        fn spawn(&self, task: BoxFuture<'static, ()>) {
            self.spawned.lock().unwrap().push(task);
        }
    }

    fn tokens() -> Arc<TokenService> {
        Arc::new(TokenService::new(KeySource::Pem {
            private: TEST_PRIVATE_KEY.to_string(),
            public: TEST_PUBLIC_KEY.to_string(),
        }))
    }

    fn settings() -> IdentitySettings {
        IdentitySettings {
            hash_cost: 1,
            ..IdentitySettings::default()
        }
    }

    fn service(store: MockUserStore, tasks: Arc<RecordingTasks>) -> IdentityService {
        IdentityService::new(Arc::new(store), tokens(), tasks, settings())
    }

    fn credential(id: i64, password: &str) -> Credential {
        Credential {
            id,
            phone_number: "+62812345678".into(),
            password_hash: hash_password(password, 1).expect("hash"),
        }
    }

    fn identity(id: i64) -> Identity {
        Identity {
            id,
            phone_number: "+62812345678".into(),
            full_name: "fullloooo".into(),
        }
    }

    fn register_input(password: &str) -> RegisterInput {
        RegisterInput {
            phone_number: "+62812345678".into(),
            full_name: "fullloooo".into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_register_stores_hash_not_password() {
        let mut store = MockUserStore::new();
        store
            .expect_create_user()
            .withf(|phone, name, hash| {
                phone == "+62812345678"
                    && name == "fullloooo"
                    && hash.starts_with("$argon2id$")
                    && !hash.contains("AAssff1!")
            })
            .times(1)
            .returning(|_, _, _| Ok(WriteOutcome::Applied(10)));

        let outcome = service(store, Arc::default())
            .register(register_input("AAssff1!"))
            .await
            .expect("register");

        assert_eq!(outcome, RegisterOutcome::Registered { id: 10 });
    }

    #[tokio::test]
    async fn test_register_conflict() {
        let mut store = MockUserStore::new();
        store
            .expect_create_user()
            .times(1)
            .returning(|_, _, _| Ok(WriteOutcome::PhoneNumberTaken));

        let outcome = service(store, Arc::default())
            .register(register_input("AAssff1!"))
            .await
            .expect("register");

        assert_eq!(outcome, RegisterOutcome::PhoneNumberExists);
    }

    #[tokio::test]
    async fn test_register_hashing_failure_never_reaches_store() {
        // No expectations: any store call panics
        let store = MockUserStore::new();
        let too_long = "A1!".repeat(30);

        let result = service(store, Arc::default())
            .register(register_input(&too_long))
            .await;

        assert!(matches!(result, Err(IdentityError::Hashing(_))));
    }

    #[tokio::test]
    async fn test_register_store_failure_is_error() {
        let mut store = MockUserStore::new();
        store
            .expect_create_user()
            .returning(|_, _, _| Err(IdentityError::Database("connection reset".into())));

        let result = service(store, Arc::default())
            .register(register_input("AAssff1!"))
            .await;

        assert!(matches!(result, Err(IdentityError::Database(_))));
    }

    #[tokio::test]
    async fn test_login_success_issues_token_and_counts_login() {
        let stored = credential(10, "AAssff1!");
        let mut store = MockUserStore::new();
        store
            .expect_find_credential_by_phone()
            .with(eq("+62812345678"))
            .returning(move |_| Ok(Some(stored.clone())));
        store
            .expect_increment_login_count()
            .with(eq(10))
            .times(1)
            .returning(|_| Ok(()));

        let tasks = Arc::new(RecordingTasks::default());
        let service = service(store, Arc::clone(&tasks));

        let outcome = service
            .login(LoginInput {
                phone_number: "+62812345678".into(),
                password: "AAssff1!".into(),
            })
            .await
            .expect("login");

        let LoginOutcome::Authenticated { id, token } = outcome else {
            panic!("expected authenticated login");
        };
        assert_eq!(id, 10);
        assert_eq!(service.tokens().verify(&token).expect("valid token"), 10);

        // Counter was dispatched, not awaited
        assert_eq!(tasks.count(), 1);
        tasks.run_all().await;
    }

    #[tokio::test]
    async fn test_login_unknown_phone() {
        let mut store = MockUserStore::new();
        store
            .expect_find_credential_by_phone()
            .returning(|_| Ok(None));

        let tasks = Arc::new(RecordingTasks::default());
        let outcome = service(store, Arc::clone(&tasks))
            .login(LoginInput {
                phone_number: "+62800000000".into(),
                password: "AAssff1!".into(),
            })
            .await
            .expect("login");

        assert_eq!(outcome, LoginOutcome::NotFound);
        assert_eq!(tasks.count(), 0);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let stored = credential(10, "AAssff1!");
        let mut store = MockUserStore::new();
        store
            .expect_find_credential_by_phone()
            .returning(move |_| Ok(Some(stored.clone())));

        let tasks = Arc::new(RecordingTasks::default());
        let outcome = service(store, Arc::clone(&tasks))
            .login(LoginInput {
                phone_number: "+62812345678".into(),
                password: "AAssff1?".into(),
            })
            .await
            .expect("login");

        assert_eq!(outcome, LoginOutcome::WrongPassword);
        assert_eq!(tasks.count(), 0);
    }

    #[tokio::test]
    async fn test_login_corrupt_hash_is_error() {
        let mut store = MockUserStore::new();
        store.expect_find_credential_by_phone().returning(|_| {
            Ok(Some(Credential {
                id: 10,
                phone_number: "+62812345678".into(),
                password_hash: "abcd".into(),
            }))
        });

        let result = service(store, Arc::default())
            .login(LoginInput {
                phone_number: "+62812345678".into(),
                password: "AAssff1!".into(),
            })
            .await;

        assert!(matches!(result, Err(IdentityError::Hashing(_))));
    }

    #[tokio::test]
    async fn test_login_counter_failure_is_not_surfaced() {
        let stored = credential(10, "AAssff1!");
        let mut store = MockUserStore::new();
        store
            .expect_find_credential_by_phone()
            .returning(move |_| Ok(Some(stored.clone())));
        store
            .expect_increment_login_count()
            .returning(|_| Err(IdentityError::Database("deadlock".into())));

        let tasks = Arc::new(RecordingTasks::default());
        let outcome = service(store, Arc::clone(&tasks))
            .login(LoginInput {
                phone_number: "+62812345678".into(),
                password: "AAssff1!".into(),
            })
            .await
            .expect("login");

        assert!(matches!(outcome, LoginOutcome::Authenticated { id: 10, .. }));
        tasks.run_all().await;
    }

    #[tokio::test]
    async fn test_get_profile() {
        let mut store = MockUserStore::new();
        store
            .expect_find_identity_by_id()
            .with(eq(10))
            .returning(|id| Ok(Some(identity(id))));

        let profile = service(store, Arc::default())
            .get_profile(10)
            .await
            .expect("profile");

        assert_eq!(profile.phone_number, "+62812345678");
        assert_eq!(profile.full_name, "fullloooo");
    }

    #[tokio::test]
    async fn test_get_profile_missing_user() {
        let mut store = MockUserStore::new();
        store.expect_find_identity_by_id().returning(|_| Ok(None));

        let result = service(store, Arc::default()).get_profile(99).await;

        assert!(matches!(result, Err(IdentityError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_update_name_only_keeps_phone() {
        let mut store = MockUserStore::new();
        store
            .expect_find_identity_by_id()
            .returning(|id| Ok(Some(identity(id))));
        store
            .expect_update_identity()
            .withf(|id, phone, name| *id == 10 && phone == "+62812345678" && name == "Budi Santoso")
            .times(1)
            .returning(|_, _, _| Ok(WriteOutcome::Applied(())));

        let outcome = service(store, Arc::default())
            .update_profile(UpdateProfileInput {
                id: 10,
                phone_number: Some(String::new()),
                full_name: Some("Budi Santoso".into()),
            })
            .await
            .expect("update");

        assert_eq!(outcome, UpdateProfileOutcome::Updated);
    }

    #[tokio::test]
    async fn test_update_phone_conflict() {
        let mut store = MockUserStore::new();
        store
            .expect_find_identity_by_id()
            .returning(|id| Ok(Some(identity(id))));
        store
            .expect_update_identity()
            .withf(|_, phone, name| phone == "+62899999999" && name == "fullloooo")
            .returning(|_, _, _| Ok(WriteOutcome::PhoneNumberTaken));

        let outcome = service(store, Arc::default())
            .update_profile(UpdateProfileInput {
                id: 10,
                phone_number: Some("+62899999999".into()),
                full_name: None,
            })
            .await
            .expect("update");

        assert_eq!(outcome, UpdateProfileOutcome::PhoneNumberExists);
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let mut store = MockUserStore::new();
        store.expect_find_identity_by_id().returning(|_| Ok(None));

        let result = service(store, Arc::default())
            .update_profile(UpdateProfileInput {
                id: 99,
                full_name: Some("Budi Santoso".into()),
                ..UpdateProfileInput::default()
            })
            .await;

        assert!(matches!(result, Err(IdentityError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_store_timeout() {
        struct SlowStore;

        #[async_trait::async_trait]
        impl UserStore for SlowStore {
            async fn create_user(&self, _: &str, _: &str, _: &str) -> Result<WriteOutcome<i64>> {
                Ok(WriteOutcome::Applied(1))
            }

            async fn find_credential_by_phone(&self, _: &str) -> Result<Option<Credential>> {
                Ok(None)
            }

            async fn find_identity_by_id(&self, id: i64) -> Result<Option<Identity>> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Some(identity(id)))
            }

            async fn update_identity(&self, _: i64, _: &str, _: &str) -> Result<WriteOutcome<()>> {
                Ok(WriteOutcome::Applied(()))
            }

            async fn increment_login_count(&self, _: i64) -> Result<()> {
                Ok(())
            }
        }

        let service = IdentityService::new(
            Arc::new(SlowStore),
            tokens(),
            Arc::new(RecordingTasks::default()),
            IdentitySettings {
                store_timeout: Duration::from_millis(20),
                ..settings()
            },
        );

        let result = service.get_profile(10).await;
        assert!(matches!(result, Err(IdentityError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_hashing_timeout_never_reaches_store() {
        // No expectations: any store call panics
        let store = MockUserStore::new();
        let service = IdentityService::new(
            Arc::new(store),
            tokens(),
            Arc::new(RecordingTasks::default()),
            IdentitySettings {
                hash_cost: 10,
                hash_timeout: Duration::ZERO,
                ..settings()
            },
        );

        let result = service.register(register_input("AAssff1!")).await;
        assert!(matches!(result, Err(IdentityError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_verify_timeout() {
        let stored = credential(10, "AAssff1!");
        let mut store = MockUserStore::new();
        store
            .expect_find_credential_by_phone()
            .returning(move |_| Ok(Some(stored.clone())));

        let service = IdentityService::new(
            Arc::new(store),
            tokens(),
            Arc::new(RecordingTasks::default()),
            IdentitySettings {
                hash_timeout: Duration::ZERO,
                ..settings()
            },
        );

        let result = service
            .login(LoginInput {
                phone_number: "+62812345678".into(),
                password: "AAssff1!".into(),
            })
            .await;
        assert!(matches!(result, Err(IdentityError::Timeout(_))));
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+6281234565678"), "+62****5678");
        assert_eq!(mask_phone("+62812"), "****");
    }
}
