use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Runs at most `max_concurrency` jobs at a time.
#[derive(Debug, Clone)]
pub struct BoundedQueue {
    semaphore: Arc<Semaphore>,
}

impl BoundedQueue {
    pub fn new(max_concurrency: usize) -> Self {
        let permits = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Queues `fut` until a slot frees up.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("bounded queue semaphore is closed");
            fut.await;
        });
    }

    /// Claims a slot now, or `None` when every slot is busy.
    pub fn try_reserve(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().ok()
    }

    /// Runs `fut` in a slot already claimed with [`Self::try_reserve`].
    pub fn spawn_reserved<F>(&self, permit: OwnedSemaphorePermit, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let _permit = permit;
            fut.await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reservations_are_bounded() {
        let queue = BoundedQueue::new(2);
        let first = queue.try_reserve();
        let second = queue.try_reserve();
        assert!(first.is_some() && second.is_some());
        assert!(queue.try_reserve().is_none());

        drop(first);
        assert_eq!(queue.available(), 1);
        assert!(queue.try_reserve().is_some());
    }

    #[tokio::test]
    async fn zero_concurrency_still_runs_one() {
        let queue = BoundedQueue::new(0);
        let (tx, rx) = tokio::sync::oneshot::channel();
        queue.spawn(async move {
            let _ = tx.send(42);
        });
        assert_eq!(rx.await.ok(), Some(42));
    }
}
