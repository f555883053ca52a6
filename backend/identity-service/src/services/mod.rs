/// Service layer for identity-service
///
/// - Identity workflow (registration, login, profile read and update)
/// - Background task dispatch (login counter)
pub mod background;
pub mod identity;

pub use background::{BackgroundTasks, TokioBackgroundTasks};
pub use identity::{
    IdentityService, IdentitySettings, LoginInput, LoginOutcome, RegisterInput, RegisterOutcome,
    UpdateProfileInput, UpdateProfileOutcome,
};
