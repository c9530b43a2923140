//! Once-a-second deadline re-evaluation for an open flow.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use veriflow_flow::Countdown;
use veriflow_types::{Clock, Timestamp};

/// Publishes the latest [`Countdown`] for one deadline.
///
/// The background task lives exactly as long as the ticker: dropping it
/// aborts the task.
pub struct DeadlineTicker {
    rx: watch::Receiver<Countdown>,
    handle: JoinHandle<()>,
}

impl DeadlineTicker {
    /// Start ticking. Must be called inside a tokio runtime.
    pub fn spawn(expires_at: Timestamp, clock: Arc<dyn Clock>, every: Duration) -> Self {
        let every = every.max(Duration::from_millis(1));
        let (tx, rx) = watch::channel(Countdown::until(expires_at, clock.now()));
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let countdown = Countdown::until(expires_at, clock.now());
                if tx.send(countdown).is_err() {
                    break;
                }
            }
        });
        tracing::debug!(expires_at = expires_at.as_secs(), "deadline ticker started");
        Self { rx, handle }
    }

    pub fn current(&self) -> Countdown {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Countdown> {
        self.rx.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for DeadlineTicker {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::debug!("deadline ticker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct ManualClock(AtomicU64);

    impl Clock for ManualClock {
        fn now(&self) -> Timestamp {
            Timestamp::new(self.0.load(Ordering::SeqCst))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_until_expired_then_stops_on_drop() {
        let clock = Arc::new(ManualClock(AtomicU64::new(100)));
        let ticker = DeadlineTicker::spawn(Timestamp::new(102), clock.clone(), Duration::from_secs(1));
        let mut rx = ticker.subscribe();
        assert_eq!(ticker.current().to_string(), "00:00:00:02");
        assert!(ticker.is_running());

        clock.0.store(101, Ordering::SeqCst);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().remaining_secs(), 1);

        clock.0.store(105, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(ticker.current().is_expired());

        rx.borrow_and_update();
        drop(ticker);
        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while rx.changed().await.is_ok() {}
        })
        .await;
        assert!(drained.is_ok(), "ticker kept publishing after drop");
    }
}
