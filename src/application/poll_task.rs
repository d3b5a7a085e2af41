// Cancellable background task handle
use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns a spawned polling loop. Stopping (or dropping) the handle cancels the
/// loop's token; the loop is expected to discard any response that completes after
/// cancellation.
#[derive(Debug)]
pub struct PollHandle {
    name: String,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn spawn<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let token = CancellationToken::new();
        let task = tokio::spawn(body(token.clone()));
        tracing::debug!(task = %name, "Started poll task");
        Self {
            name,
            token,
            task: Some(task),
        }
    }

    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!(task = %self.name, "Stopping poll task");
            self.token.cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(task = %self.name, "Poll task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
