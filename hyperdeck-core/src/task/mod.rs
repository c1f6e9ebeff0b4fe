//! Ownership of the background work tied to one connection.
//!
//! Every task a session spawns (the reader, the poller, detached clip
//! refreshes) runs under the session's `CancellationToken`. Cancelling the
//! token or dropping the `SessionTasks` ends all of them, so nothing from
//! an old transport survives a reconnect.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct SessionTasks {
    cancel: CancellationToken,
    handles: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl Default for SessionTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTasks {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn `fut`, stopping it early if the session is cancelled.
    pub fn spawn<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => debug!(task = name, "cancelled"),
                _ = fut => debug!(task = name, "finished"),
            }
        });

        let mut handles = self.handles();
        handles.retain(|(_, h)| !h.is_finished());
        handles.push((name, handle));
    }

    /// A token that fires when the session ends.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Number of tasks that have not finished yet.
    pub fn running(&self) -> usize {
        self.handles().iter().filter(|(_, h)| !h.is_finished()).count()
    }

    /// Cancel everything and wait for the tasks to wind down.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles: Vec<_> = self.handles().drain(..).collect();
        for (name, handle) in handles {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(task = name, "task panicked");
                }
            }
        }
    }

    fn handles(&self) -> MutexGuard<'_, Vec<(&'static str, JoinHandle<()>)>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionTasks {
    fn drop(&mut self) {
        self.cancel.cancel();
        for (_, handle) in self.handles().drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn shutdown_stops_long_running_tasks() {
        let tasks = SessionTasks::new();
        tasks.spawn("forever", std::future::pending());
        tasks.spawn("forever-too", std::future::pending());
        assert_eq!(tasks.running(), 2);

        tokio::time::timeout(Duration::from_secs(1), tasks.shutdown())
            .await
            .expect("shutdown hung");
        assert!(tasks.is_cancelled());
        assert_eq!(tasks.running(), 0);
    }

    #[tokio::test]
    async fn finished_tasks_are_pruned() {
        let tasks = SessionTasks::new();
        let ran = Arc::new(AtomicBool::new(false));
        tasks.spawn("once", {
            let ran = ran.clone();
            async move { ran.store(true, Ordering::SeqCst) }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(tasks.running(), 0);
    }

    #[tokio::test]
    async fn cancelled_tasks_never_reach_their_work() {
        let tasks = SessionTasks::new();
        let ran = Arc::new(AtomicBool::new(false));
        tasks.cancel();
        tasks.spawn("late", {
            let ran = ran.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                ran.store(true, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn drop_aborts_tasks() {
        let token = {
            let tasks = SessionTasks::new();
            tasks.spawn("forever", std::future::pending());
            tasks.token()
        };
        assert!(token.is_cancelled());
    }
}
