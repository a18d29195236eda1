//! Event dispatcher — a bounded mailbox drained by a single distribution
//! thread.
//!
//! Each event is delivered to every activated component in directory
//! registration order, then to every [`FinalEventListener`]. One event is
//! fully distributed before the next is taken. A failing or panicking
//! component is logged and skipped; the round continues.

use std::any::Any;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use homebus_domain::error::SendError;
use homebus_domain::event::Event;

use crate::directory::Directory;
use crate::ports::FinalEventListener;
use crate::statistics::{DistributionStatistics, as_millis_f64};

/// Mailbox capacity used when none is configured.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 20;

const DISTRIBUTOR_THREAD_NAME: &str = "event-distributor";

#[derive(Debug)]
enum Envelope {
    Event(Event),
    /// Stops the distribution loop once everything queued before it is done.
    Quit,
}

/// Producer side of the mailbox. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: mpsc::Sender<Envelope>,
    statistics: Arc<DistributionStatistics>,
    sent: Arc<AtomicU64>,
}

impl EventBus {
    /// Queue an event without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::MailboxFull`] when the mailbox is at capacity (the
    /// event is dropped and the stalled component is logged) and
    /// [`SendError::Closed`] after shutdown.
    pub fn send(&self, event: Event) -> Result<(), SendError> {
        match self.sender.try_send(Envelope::Event(event)) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(Envelope::Event(event))) => {
                match self.statistics.current_item() {
                    Some((component, busy)) => tracing::error!(
                        %event,
                        %component,
                        busy_ms = as_millis_f64(busy),
                        "event mailbox full, dropping event"
                    ),
                    None => tracing::error!(%event, "event mailbox full, dropping event"),
                }
                Err(SendError::MailboxFull)
            }
            Err(TrySendError::Full(Envelope::Quit)) => Err(SendError::MailboxFull),
            Err(TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    /// A fresh event with `Type` and `Value` set.
    #[must_use]
    pub fn create_event(&self, event_type: &str, value: &str) -> Event {
        Event::with_value(event_type, value)
    }

    /// Number of events accepted into the mailbox so far.
    #[must_use]
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn statistics(&self) -> &Arc<DistributionStatistics> {
        &self.statistics
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Registered final listeners.
#[derive(Default)]
pub struct FinalListeners {
    listeners: RwLock<Vec<Arc<dyn FinalEventListener>>>,
}

impl FinalListeners {
    pub fn register(&self, listener: Arc<dyn FinalEventListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Remove a listener previously registered (compared by pointer).
    pub fn unregister(&self, listener: &Arc<dyn FinalEventListener>) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|registered| !Arc::ptr_eq(registered, listener));
        listeners.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify(&self, event: &Event, handled: bool) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                listener.receive_final_event(event, handled);
            }));
            if let Err(panic) = outcome {
                tracing::warn!(%event, reason = panic_message(panic.as_ref()), "final listener panicked");
            }
        }
    }
}

impl std::fmt::Debug for FinalListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalListeners")
            .field("len", &self.len())
            .finish()
    }
}

/// Owns the distribution thread.
#[derive(Debug)]
pub struct Dispatcher {
    bus: EventBus,
    listeners: Arc<FinalListeners>,
    thread: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start the distribution thread over `directory` with a mailbox of
    /// `capacity` events (at least one).
    ///
    /// # Errors
    ///
    /// Returns an error when the thread cannot be spawned.
    pub fn spawn(directory: Arc<Directory>, capacity: usize) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let statistics = Arc::new(DistributionStatistics::new());
        let listeners = Arc::new(FinalListeners::default());

        let distributor = Distributor {
            directory,
            statistics: Arc::clone(&statistics),
            listeners: Arc::clone(&listeners),
        };
        let thread = std::thread::Builder::new()
            .name(DISTRIBUTOR_THREAD_NAME.to_string())
            .spawn(move || distributor.run(receiver))?;

        tracing::debug!(capacity, "event dispatcher started");
        Ok(Self {
            bus: EventBus {
                sender,
                statistics,
                sent: Arc::new(AtomicU64::new(0)),
            },
            listeners,
            thread: Some(thread),
        })
    }

    /// A producer handle onto the mailbox.
    #[must_use]
    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    #[must_use]
    pub fn listeners(&self) -> &Arc<FinalListeners> {
        &self.listeners
    }

    #[must_use]
    pub fn statistics(&self) -> &Arc<DistributionStatistics> {
        &self.bus.statistics
    }

    /// Queue the quit marker behind every pending event and wait for the
    /// distribution thread to finish. Calling it again does nothing.
    ///
    /// Blocks the calling thread; async callers go through
    /// `spawn_blocking`.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        loop {
            match self.bus.sender.try_send(Envelope::Quit) {
                Ok(()) | Err(TrySendError::Closed(_)) => break,
                Err(TrySendError::Full(_)) => std::thread::sleep(Duration::from_millis(5)),
            }
        }
        if thread.thread().id() == std::thread::current().id() {
            return;
        }
        if thread.join().is_err() {
            tracing::error!("event distributor thread panicked");
        }
        tracing::debug!("event dispatcher stopped");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Distributor {
    directory: Arc<Directory>,
    statistics: Arc<DistributionStatistics>,
    listeners: Arc<FinalListeners>,
}

impl Distributor {
    fn run(self, mut receiver: mpsc::Receiver<Envelope>) {
        while let Some(Envelope::Event(event)) = receiver.blocking_recv() {
            self.statistics.start_round();
            let handled = self.distribute(&event);
            self.statistics.end_round();
            self.listeners.notify(&event, handled);
        }
        tracing::debug!("event distribution loop ended");
    }

    fn distribute(&self, event: &Event) -> bool {
        let mut handled = false;
        for component in self.directory.snapshot().iter() {
            if !component.is_activated() {
                continue;
            }
            let name = component.name();
            self.statistics.start_item(&name);
            match catch_unwind(AssertUnwindSafe(|| component.receive_event(event))) {
                Ok(Ok(acted)) => handled |= acted,
                Ok(Err(err)) => {
                    tracing::warn!(component = %name, %event, error = %err, "component failed to handle event");
                }
                Err(panic) => tracing::warn!(
                    component = %name,
                    %event,
                    reason = panic_message(panic.as_ref()),
                    "component panicked while handling event"
                ),
            }
            self.statistics.end_item();
        }
        handled
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
