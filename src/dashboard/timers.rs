//! Cancellable one-shot timers owned by the current dashboard.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct Timer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Set of pending timers. Each timer delivers one message on expiry unless
/// cancelled first.
#[derive(Default)]
pub struct Timers {
    next_id: u64,
    pending: HashMap<TimerId, Timer>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `message` on `sender` after `delay`. Must be called within a
    /// tokio runtime.
    pub fn schedule<T: Send + 'static>(
        &mut self,
        delay: Duration,
        sender: mpsc::Sender<T>,
        message: T,
    ) -> TimerId {
        self.prune();
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = sleep(delay) => {
                    let _ = sender.send(message).await;
                }
            }
        });
        self.pending.insert(id, Timer { token, handle });
        id
    }

    /// `false` when `id` is unknown or already fired.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.pending.remove(&id) {
            Some(timer) if !timer.handle.is_finished() => {
                timer.token.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn cancel_all(&mut self) {
        let count = self.pending.len();
        for (_, timer) in self.pending.drain() {
            timer.token.cancel();
        }
        if count > 0 {
            log::debug!("cancelled {} dashboard timer(s)", count);
        }
    }

    /// Timers that have neither fired nor been cancelled.
    pub fn active(&self) -> usize {
        self.pending
            .values()
            .filter(|timer| !timer.handle.is_finished())
            .count()
    }

    fn prune(&mut self) {
        self.pending.retain(|_, timer| !timer.handle.is_finished());
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
