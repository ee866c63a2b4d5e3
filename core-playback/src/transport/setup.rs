//! Setup deduplication shared by both adapters.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::future::Future;

type SetupFuture = Shared<BoxFuture<'static, bool>>;

/// Runs an initialization future at most once at a time.
///
/// Callers arriving while setup is in flight await the same shared future. A
/// failed setup clears the slot so the next caller starts over; a successful
/// one stays cached until [`SetupGuard::reset`].
#[derive(Default)]
pub(crate) struct SetupGuard {
    slot: Mutex<Option<SetupFuture>>,
}

impl SetupGuard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn run<F, Fut>(&self, init: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let shared = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let fresh = init().boxed().shared();
                    *slot = Some(fresh.clone());
                    fresh
                }
            }
        };

        let ok = shared.clone().await;
        if !ok {
            let mut slot = self.slot.lock();
            if slot
                .as_ref()
                .is_some_and(|current| Shared::ptr_eq(current, &shared))
            {
                *slot = None;
            }
        }
        ok
    }

    /// Whether a setup has finished successfully.
    pub(crate) fn is_ready(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .and_then(|setup| setup.peek().copied())
            .unwrap_or(false)
    }

    /// Forget any completed or in-flight setup.
    pub(crate) fn reset(&self) {
        *self.slot.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_setup() {
        let guard = SetupGuard::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let make = || {
            let runs = Arc::clone(&runs);
            move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                true
            }
        };

        let (a, b) = tokio::join!(guard.run(make()), guard.run(make()));
        assert!(a && b);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(guard.is_ready());

        assert!(guard.run(make()).await);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_setup_is_retried() {
        let guard = SetupGuard::new();
        assert!(!guard.run(|| async { false }).await);
        assert!(!guard.is_ready());

        assert!(guard.run(|| async { true }).await);
        assert!(guard.is_ready());

        guard.reset();
        assert!(!guard.is_ready());
    }
}
