//! Component port — the contract every live component satisfies.

use std::any::Any;
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use homebus_domain::error::ComponentError;
use homebus_domain::event::Event;
use homebus_domain::id::ComponentId;

use crate::schema::Capabilities;
use crate::service::ServiceHandle;

/// Shared handle to a registered component.
pub type ComponentRef = Arc<dyn Component>;

/// A named, addressable unit of behaviour living in the directory.
///
/// Implementations embed a [`ComponentCore`] for identity and lifecycle
/// bookkeeping and describe themselves through a schema text plus the
/// [`Capabilities`] that schema refers to.
///
/// `receive_event` runs on the dispatcher thread while attribute and action
/// calls arrive from any caller thread. Components synchronize their own
/// state accordingly.
pub trait Component: Any + Send + Sync {
    /// Identity and lifecycle state.
    fn core(&self) -> &ComponentCore;

    /// Declarative schema text (TOML). May vary per instance for morphing types.
    fn schema(&self) -> Cow<'_, str>;

    /// The named getters, setters and actions the schema may refer to.
    fn capabilities(&self) -> Capabilities;

    /// Handle one dispatched event, returning whether it was acted upon.
    ///
    /// # Errors
    ///
    /// A [`ComponentError`] is logged by the dispatcher and does not stop
    /// the dispatch round.
    fn receive_event(&self, _event: &Event) -> Result<bool, ComponentError> {
        Ok(false)
    }

    /// Hook run once the service handle is attached.
    ///
    /// # Errors
    ///
    /// A failure leaves the component registered but inert.
    fn on_activate(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Hook run before the service handle is detached.
    fn on_stop(&self) {}

    fn name(&self) -> String {
        self.core().name()
    }

    fn set_name(&self, name: &str) {
        self.core().set_name(name);
    }

    fn id(&self) -> ComponentId {
        self.core().id()
    }

    fn set_id(&self, id: ComponentId) {
        self.core().set_id(id);
    }

    /// Attach the service handle and run [`on_activate`](Self::on_activate).
    ///
    /// # Errors
    ///
    /// Propagates the hook failure; the handle is detached again.
    fn activate(&self, service: ServiceHandle) -> Result<(), ComponentError> {
        self.core().attach(service);
        if let Err(err) = self.on_activate() {
            self.core().detach();
            return Err(err);
        }
        Ok(())
    }

    /// Run [`on_stop`](Self::on_stop) and detach the service handle.
    fn stop(&self) {
        self.on_stop();
        self.core().detach();
    }

    /// Whether the component currently holds a service handle.
    fn is_activated(&self) -> bool {
        self.core().is_activated()
    }
}

/// Identity (`name`, `id`) and the service handle received on activation.
#[derive(Debug, Default)]
pub struct ComponentCore {
    name: RwLock<String>,
    id: AtomicU64,
    service: RwLock<Option<ServiceHandle>>,
}

impl ComponentCore {
    #[must_use]
    pub fn new(name: impl Into<String>, id: ComponentId) -> Self {
        Self {
            name: RwLock::new(name.into()),
            id: AtomicU64::new(id.get()),
            service: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = name.to_string();
    }

    #[must_use]
    pub fn id(&self) -> ComponentId {
        ComponentId::new(self.id.load(Ordering::Acquire))
    }

    pub fn set_id(&self, id: ComponentId) {
        self.id.store(id.get(), Ordering::Release);
    }

    /// The service handle, when activated.
    #[must_use]
    pub fn service(&self) -> Option<ServiceHandle> {
        self.service
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_activated(&self) -> bool {
        self.service
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub(crate) fn attach(&self, service: ServiceHandle) {
        *self.service.write().unwrap_or_else(PoisonError::into_inner) = Some(service);
    }

    pub(crate) fn detach(&self) {
        self.service
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Type-erased view used to downcast a component to its concrete type.
pub(crate) fn as_any(component: &dyn Component) -> &dyn Any {
    component
}
