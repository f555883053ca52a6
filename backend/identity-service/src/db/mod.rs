/// Database access layer for identity-service
pub mod users;

pub use users::{PgUserStore, UserStore, WriteOutcome};

#[cfg(test)]
pub use users::MockUserStore;
