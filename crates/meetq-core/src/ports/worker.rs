use async_trait::async_trait;

/// Processing side of the queue.
///
/// `stop()` is cooperative: it does not cancel in-flight handler execution, it
/// only asks `run_forever()` to return once the work at hand is finished.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Run until `stop()` is observed.
    async fn run_forever(&self);

    /// Request shutdown. Safe to call more than once, and before `run_forever`.
    fn stop(&self);
}
