//! Heartbeat — broadcasts a `MinuteEvent` once per period.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use homebus_domain::event::{Event, MINUTE_EVENT_TYPE};
use homebus_domain::time;

use crate::dispatcher::EventBus;

const MINUTE: Duration = Duration::from_secs(60);

/// Background task sending heartbeat events. Aborted when dropped.
#[derive(Debug)]
pub struct Heartbeat {
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Spawn on the current tokio runtime.
    ///
    /// A one-minute period fires first on the next whole minute; any other
    /// period fires first after one period.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn spawn(bus: EventBus, period: Duration) -> Self {
        let start = Instant::now() + first_tick_delay(period);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                tracing::trace!("heartbeat");
                if let Err(err) = bus.send(Event::new(MINUTE_EVENT_TYPE)) {
                    tracing::warn!(error = %err, "heartbeat event not delivered");
                }
            }
        });
        Self { handle }
    }

    /// Cancel the task.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn first_tick_delay(period: Duration) -> Duration {
    if period != MINUTE {
        return period;
    }
    let now = time::now();
    (time::next_whole_minute(now) - now)
        .to_std()
        .unwrap_or(period)
}
