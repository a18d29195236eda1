//! Service handle — what a component receives on activation.

use std::sync::{Arc, Weak};

use homebus_domain::directory::DirectoryEntry;
use homebus_domain::error::SendError;
use homebus_domain::event::Event;

use crate::directory::Directory;
use crate::dispatcher::EventBus;
use crate::proxy::ComponentProxy;

/// Lets an activated component send events and reach other components.
///
/// Holds the directory weakly: a handle kept by a component does not keep
/// the directory alive after shutdown.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    bus: EventBus,
    directory: Weak<Directory>,
}

impl ServiceHandle {
    #[must_use]
    pub fn new(bus: EventBus, directory: &Arc<Directory>) -> Self {
        Self {
            bus,
            directory: Arc::downgrade(directory),
        }
    }

    /// Queue an event for distribution.
    ///
    /// # Errors
    ///
    /// See [`EventBus::send`].
    pub fn send(&self, event: Event) -> Result<(), SendError> {
        self.bus.send(event)
    }

    #[must_use]
    pub fn create_event(&self, event_type: &str, value: &str) -> Event {
        self.bus.create_event(event_type, value)
    }

    /// A proxy onto another component, by name or id.
    #[must_use]
    pub fn open_instance(&self, name_or_id: &str) -> Option<ComponentProxy> {
        let directory = self.directory.upgrade()?;
        let component = directory.find(name_or_id)?;
        match ComponentProxy::open(component, directory.schemas(), Some(self.clone())) {
            Ok(proxy) => Some(proxy),
            Err(err) => {
                tracing::warn!(instance = name_or_id, error = %err, "cannot open instance");
                None
            }
        }
    }

    /// Directory entries matching `pattern` (see [`Directory::list`]).
    #[must_use]
    pub fn list_instances(&self, pattern: &str) -> Vec<DirectoryEntry> {
        self.directory
            .upgrade()
            .map(|directory| directory.list(pattern))
            .unwrap_or_default()
    }
}
