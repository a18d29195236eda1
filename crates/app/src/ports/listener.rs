//! Final event listener port.

use homebus_domain::event::Event;

/// Observes every event once its dispatch round has completed.
///
/// Listeners run on the dispatcher thread and must return promptly.
pub trait FinalEventListener: Send + Sync {
    /// `handled` is true when at least one component acted upon the event.
    fn receive_final_event(&self, event: &Event, handled: bool);
}

impl<F> FinalEventListener for F
where
    F: Fn(&Event, bool) + Send + Sync,
{
    fn receive_final_event(&self, event: &Event, handled: bool) {
        self(event, handled);
    }
}
