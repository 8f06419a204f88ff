use super::Flags;
use crate::lock;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Collapses bursts of link/unlink activity into one notification request.
///
/// Every call to [`schedule`](Self::schedule) restarts the timer, so the
/// request flag is raised only after `delay` of quiet.
pub struct NotificationDebouncer {
    delay: Duration,
    flags: Flags,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationDebouncer {
    pub fn new(delay: Duration, flags: Flags) -> Self {
        Self {
            delay,
            flags,
            pending: Mutex::new(None),
        }
    }

    pub fn schedule(&self) {
        let mut pending = lock(&self.pending);
        if let Some(old) = pending.take() {
            old.abort();
        }

        debug!(
            "Reschedule resource runtime value notifications order by {:?}",
            self.delay
        );
        let delay = self.delay;
        let flags = self.flags.clone();
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("Delayed resource value notifications request is now enabled");
            flags.set_value_notification_requested(true);
        }));
    }

    pub fn cancel(&self) {
        if let Some(old) = lock(&self.pending).take() {
            old.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const DELAY: Duration = Duration::from_millis(1000);

    #[tokio::test(start_paused = true)]
    async fn flag_raised_after_quiet_period() {
        let flags = Flags::default();
        let debouncer = NotificationDebouncer::new(DELAY, flags.clone());

        debouncer.schedule();
        sleep(Duration::from_millis(999)).await;
        assert!(!flags.get().value_notification_requested);

        sleep(Duration::from_millis(2)).await;
        assert!(flags.get().value_notification_requested);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_is_timed_from_last_call() {
        let flags = Flags::default();
        let debouncer = NotificationDebouncer::new(DELAY, flags.clone());

        for _ in 0..5 {
            debouncer.schedule();
            sleep(Duration::from_millis(600)).await;
            assert!(!flags.get().value_notification_requested);
        }

        // 600ms after the last call
        sleep(Duration::from_millis(401)).await;
        assert!(flags.get().value_notification_requested);

        // Exactly one flip: nothing raises it again.
        flags.set_value_notification_requested(false);
        sleep(Duration::from_secs(10)).await;
        assert!(!flags.get().value_notification_requested);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_request() {
        let flags = Flags::default();
        let debouncer = NotificationDebouncer::new(DELAY, flags.clone());

        debouncer.schedule();
        debouncer.cancel();
        sleep(Duration::from_secs(5)).await;
        assert!(!flags.get().value_notification_requested);
    }
}
