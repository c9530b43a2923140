//! Per-flow close signal.
//!
//! Work started on behalf of a flow (simulated latency, backend calls)
//! `select!`s on a receiver from here so closing the flow cancels it.

use tokio::sync::broadcast;

pub struct CloseSignal {
    tx: broadcast::Sender<()>,
}

impl CloseSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Get a receiver that will be notified when the flow closes.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn close(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for CloseSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CloseSignal {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_notifies_subscribers() {
        let signal = CloseSignal::new();
        let mut rx1 = signal.subscribe();
        let mut rx2 = signal.subscribe();
        signal.close();
        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn dropping_the_signal_also_wakes_receivers() {
        let signal = CloseSignal::new();
        let mut rx = signal.subscribe();
        drop(signal);
        // Either the final notification or the closed channel; both end the wait.
        let _ = rx.recv().await;
    }
}
