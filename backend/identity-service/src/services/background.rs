/// Fire-and-forget task dispatch
use futures_util::future::BoxFuture;

/// Runs side effects detached from the request that triggered them
///
/// Implementations must not report the task's outcome to the caller; the task
/// itself is responsible for logging its own failures.
pub trait BackgroundTasks: Send + Sync {
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Spawns onto the current Tokio runtime
#[derive(Debug, Clone, Default)]
pub struct TokioBackgroundTasks;

impl BackgroundTasks for TokioBackgroundTasks {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }
}
