// SPDX-License-Identifier: MIT

use parking_lot::Mutex;
use tokio::sync::watch;

/// A counting quiescence barrier (spec.md §4.4). Every node `claim()`s the
/// lock once per in-flight event send and `release()`s it when that send
/// lands (or the target already finished); the driver also gives every
/// node one permanent claim that it releases on completion. `wait()`
/// resolves once the count reaches zero — i.e. once no node is still
/// running and no event is still being delivered.
///
/// Modeled on the original's `chan struct{}` closed-on-zero idiom, adapted
/// from a one-shot broadcast (see `async_latch` in the pantsbuild/pants
/// engine crate) into a counting one: we fire a `watch` once instead of
/// closing a channel, since `watch` receivers observe a latched value
/// forever after, matching "closed channels always read ready".
pub struct Lock {
    count: Mutex<i64>,
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl Lock {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            count: Mutex::new(0),
            tx,
            rx,
        }
    }

    pub fn add(&self, n: i64) {
        let mut count = self.count.lock();
        *count += n;
        if *count <= 0 {
            let _ = self.tx.send(true);
        }
    }

    pub fn claim(&self) {
        self.add(1);
    }

    pub fn release(&self) {
        self.add(-1);
    }

    /// Resolves once the lock has reached quiescence. Safe to call any
    /// number of times, including after the lock has already fired.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fires_when_count_reaches_zero() {
        let lock = Arc::new(Lock::new());
        lock.add(2);
        lock.release();
        let waited = tokio::time::timeout(Duration::from_millis(50), lock.wait()).await;
        assert!(waited.is_err(), "should not fire before count hits zero");
        lock.release();
        tokio::time::timeout(Duration::from_millis(50), lock.wait())
            .await
            .expect("should fire once count hits zero");
    }

    #[tokio::test]
    async fn stays_fired_for_late_waiters() {
        let lock = Lock::new();
        lock.add(1);
        lock.release();
        lock.wait().await;
        lock.wait().await;
    }

    #[tokio::test]
    async fn never_fires_with_no_claims() {
        let lock = Lock::new();
        let waited = tokio::time::timeout(Duration::from_millis(30), lock.wait()).await;
        // count starts at 0, so a lock with no claims is already quiescent.
        assert!(waited.is_ok());
    }
}
