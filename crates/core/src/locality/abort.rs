//! Cooperative cancellation shared between a task's owner and its driver.

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable flag that, once raised, stays raised.
///
/// Every clone observes the same flag, so the manager keeps one clone and
/// hands another to the running driver.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    flag: Arc<watch::Sender<bool>>,
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortSignal {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    pub fn abort(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves once the signal is raised. Never resolves otherwise.
    pub async fn aborted(&self) {
        let mut rx = self.flag.subscribe();
        if rx.wait_for(|raised| *raised).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
