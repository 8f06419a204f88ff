use crate::consts::{ButtonEvent, ResourceId};
use crate::host::Host;
use crate::lock;
use crate::value::{ResourceValue, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Push-button trigger channel attached to a resource.
#[derive(Debug, Clone, Copy)]
pub struct ButtonChannel<'a> {
    pub id: &'a str,
    pub long_press_time: Duration,
}

struct LongPressTimer {
    id: u64,
    handle: JoinHandle<()>,
}

type Timers = Arc<Mutex<HashMap<String, LongPressTimer>>>;

/// Turns boolean resource transitions into press, release, short and long
/// press trigger events.
pub struct ButtonClassifier {
    host: Arc<dyn Host>,
    max_long_press: Duration,
    last_press: Mutex<HashMap<ResourceId, Instant>>,
    /// At most one pending long press timer per channel.
    timers: Timers,
    next_timer_id: AtomicU64,
}

impl ButtonClassifier {
    pub fn new(host: Arc<dyn Host>, max_long_press: Duration) -> Self {
        Self {
            host,
            max_long_press,
            last_press: Mutex::new(HashMap::new()),
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_timer_id: AtomicU64::new(0),
        }
    }

    fn threshold(&self, channel: &ButtonChannel<'_>) -> Duration {
        channel.long_press_time.min(self.max_long_press)
    }

    /// `buttons` are the push-button channels bound to the value's resource.
    pub fn on_value(&self, value: &ResourceValue, buttons: &[ButtonChannel<'_>]) {
        let Value::Boolean(pressed) = value.value else {
            return;
        };

        if pressed {
            lock(&self.last_press).insert(value.resource_id, Instant::now());
            for button in buttons {
                debug!("Button '{}' pressed", button.id);
                self.host.trigger(button.id, ButtonEvent::Pressed.as_str());
                self.start_long_press_timer(button.id, self.threshold(button));
            }
        } else {
            let Some(pressed_at) = lock(&self.last_press).get(&value.resource_id).copied() else {
                // Initial `false` values after startup, no press to finish.
                return;
            };
            let elapsed = pressed_at.elapsed();
            debug!("Time between updates: {:?}", elapsed);

            for button in buttons {
                self.cancel_long_press_timer(button.id);
                self.host.trigger(button.id, ButtonEvent::Released.as_str());
                self.host
                    .trigger(button.id, &elapsed.as_millis().to_string());
                if elapsed < self.threshold(button) {
                    self.host.trigger(button.id, ButtonEvent::ShortPress.as_str());
                }
            }
        }
    }

    fn start_long_press_timer(&self, channel: &str, after: Duration) {
        self.cancel_long_press_timer(channel);
        debug!("Create long press task for channel '{}'", channel);

        let id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);
        let host = self.host.clone();
        let timers = self.timers.clone();
        let channel_id = channel.to_string();
        // Held until the timer entry is inserted, so the task can't remove it first.
        let mut guard = lock(&self.timers);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            host.trigger(&channel_id, ButtonEvent::LongPress.as_str());
            let mut timers = lock(&timers);
            if timers.get(&channel_id).is_some_and(|t| t.id == id) {
                timers.remove(&channel_id);
            }
        });
        guard.insert(channel.to_string(), LongPressTimer { id, handle });
    }

    fn cancel_long_press_timer(&self, channel: &str) {
        if let Some(timer) = lock(&self.timers).remove(channel) {
            debug!("Cancel long press task for channel '{}'", channel);
            timer.handle.abort();
        }
    }

    pub fn cancel_all(&self) {
        for (_, timer) in lock(&self.timers).drain() {
            timer.handle.abort();
        }
    }

    /// Number of long press timers still waiting.
    pub fn pending_timers(&self) -> usize {
        lock(&self.timers).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use tokio::time::sleep;

    const BUTTON: &str = "button";

    fn setup() -> (Arc<MemoryHost>, ButtonClassifier) {
        let host = Arc::new(MemoryHost::new());
        let classifier = ButtonClassifier::new(host.clone(), Duration::from_millis(5000));
        (host, classifier)
    }

    fn channels(long_press_ms: u64) -> [ButtonChannel<'static>; 1] {
        [ButtonChannel {
            id: BUTTON,
            long_press_time: Duration::from_millis(long_press_ms),
        }]
    }

    fn press(value: bool) -> ResourceValue {
        ResourceValue::new(42, Value::Boolean(value))
    }

    #[tokio::test(start_paused = true)]
    async fn short_press_sequence() {
        let (host, classifier) = setup();
        let buttons = channels(1000);

        classifier.on_value(&press(true), &buttons);
        sleep(Duration::from_millis(300)).await;
        classifier.on_value(&press(false), &buttons);
        sleep(Duration::from_secs(3)).await;

        assert_eq!(
            host.triggers(BUTTON),
            vec!["PRESSED", "RELEASED", "300", "SHORT_PRESS"]
        );
        assert_eq!(classifier.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn long_press_fires_once_without_short_press() {
        let (host, classifier) = setup();
        let buttons = channels(1000);

        classifier.on_value(&press(true), &buttons);
        sleep(Duration::from_millis(999)).await;
        assert_eq!(host.triggers(BUTTON), vec!["PRESSED"]);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(host.triggers(BUTTON), vec!["PRESSED", "LONG_PRESS"]);
        assert_eq!(classifier.pending_timers(), 0);

        sleep(Duration::from_millis(500)).await;
        classifier.on_value(&press(false), &buttons);
        assert_eq!(
            host.triggers(BUTTON),
            vec!["PRESSED", "LONG_PRESS", "RELEASED", "1501"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_is_capped() {
        let (host, classifier) = setup();
        let buttons = channels(60_000);

        classifier.on_value(&press(true), &buttons);
        sleep(Duration::from_millis(5001)).await;
        assert_eq!(host.triggers(BUTTON), vec!["PRESSED", "LONG_PRESS"]);
    }

    #[tokio::test(start_paused = true)]
    async fn second_press_replaces_timer() {
        let (host, classifier) = setup();
        let buttons = channels(1000);

        classifier.on_value(&press(true), &buttons);
        sleep(Duration::from_millis(500)).await;
        classifier.on_value(&press(true), &buttons);
        assert_eq!(classifier.pending_timers(), 1);

        // The first timer would have fired at 1000ms.
        sleep(Duration::from_millis(600)).await;
        assert!(!host.triggers(BUTTON).contains(&"LONG_PRESS".to_string()));

        sleep(Duration::from_millis(401)).await;
        assert_eq!(
            host.triggers(BUTTON),
            vec!["PRESSED", "PRESSED", "LONG_PRESS"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn release_without_press_is_ignored() {
        let (host, classifier) = setup();
        classifier.on_value(&press(false), &channels(1000));
        assert!(host.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_stops_timers() {
        let (host, classifier) = setup();
        classifier.on_value(&press(true), &channels(1000));
        classifier.cancel_all();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(host.triggers(BUTTON), vec!["PRESSED"]);
    }

    #[tokio::test(start_paused = true)]
    async fn non_boolean_values_are_ignored() {
        let (host, classifier) = setup();
        let value = ResourceValue::new(42, Value::Timer(10));
        classifier.on_value(&value, &channels(1000));
        assert!(host.events().is_empty());
    }
}
