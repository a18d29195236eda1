//! Shared test fixtures: a configurable probe component and a running
//! directory + dispatcher pair.

use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use homebus_domain::error::ComponentError;
use homebus_domain::event::{Event, VALUE_ATTRIBUTE};
use homebus_domain::id::ComponentId;

use crate::directory::Directory;
use crate::dispatcher::{DEFAULT_MAILBOX_CAPACITY, Dispatcher, EventBus};
use crate::ports::{Component, ComponentCore, ComponentRef};
use crate::schema::Capabilities;
use crate::service::ServiceHandle;

pub(crate) const PROBE_SCHEMA: &str = r#"
class = "Probe"
category = "Controls"
morphing = true

[[attribute]]
name = "Value"
get = "value"
set = "set_value"
default = true

[[attribute]]
name = "ReadOnly"
get = "value"

[[attribute]]
name = "InitOnly"
get = "value"
init = "init_value"

[[attribute]]
name = "Target"
type = "Item"
get = "target"
set = "set_target"

[[action]]
name = "Echo"
method = "echo"
default = true

[[action]]
name = "Fail"
method = "fail"
"#;

const PROBE_EXTRA: &str = "[[attribute]]\nname = \"Extra\"\nget = \"value\"\n\n";

/// Deliveries recorded across components, as `(component, event type)`.
pub(crate) type Journal = Arc<Mutex<Vec<(String, String)>>>;

/// Event type the probe applies to its `Value` attribute.
pub(crate) const PROBE_SET_EVENT: &str = "Probe_Set";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Variant {
    Plain,
    Extra,
    Broken,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Reaction {
    Ignore,
    Handle,
    Fail,
    Panic,
}

struct Gate {
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

/// Test side of a gated probe.
pub(crate) struct GateControl {
    pub entered: mpsc::Receiver<()>,
    pub release: mpsc::Sender<()>,
}

/// A configurable component recording everything it receives.
pub(crate) struct Probe {
    core: ComponentCore,
    value: Mutex<String>,
    target: Mutex<String>,
    variant: Mutex<Variant>,
    received: Mutex<Vec<Event>>,
    stops: AtomicUsize,
    reaction: Reaction,
    fail_activation: bool,
    gate: Option<Gate>,
    journal: Option<Journal>,
}

impl Probe {
    pub fn new(name: &str, id: u64) -> Self {
        Self {
            core: ComponentCore::new(name, ComponentId::new(id)),
            value: Mutex::new(String::new()),
            target: Mutex::new(String::new()),
            variant: Mutex::new(Variant::Plain),
            received: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            reaction: Reaction::Ignore,
            fail_activation: false,
            gate: None,
            journal: None,
        }
    }

    pub fn handling(mut self) -> Self {
        self.reaction = Reaction::Handle;
        self
    }

    pub fn failing(mut self) -> Self {
        self.reaction = Reaction::Fail;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.reaction = Reaction::Panic;
        self
    }

    pub fn failing_activation(mut self) -> Self {
        self.fail_activation = true;
        self
    }

    /// Block inside every `receive_event` until released.
    pub fn gated(mut self) -> (Self, GateControl) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        self.gate = Some(Gate {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let control = GateControl {
            entered: entered_rx,
            release: release_tx,
        };
        (self, control)
    }

    /// Also record every delivery into a journal shared with other components.
    pub fn journaled(mut self, journal: &Journal) -> Self {
        self.journal = Some(Arc::clone(journal));
        self
    }

    pub fn with_target(self, target: &str) -> Self {
        *self.target.lock().unwrap() = target.to_string();
        self
    }

    pub fn value(&self) -> String {
        self.value.lock().unwrap().clone()
    }

    pub fn received(&self) -> Vec<Event> {
        self.received.lock().unwrap().clone()
    }

    pub fn received_types(&self) -> Vec<String> {
        self.received()
            .iter()
            .map(|event| event.event_type().to_string())
            .collect()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn add_extra_attribute(&self) {
        *self.variant.lock().unwrap() = Variant::Extra;
    }

    pub fn break_schema(&self) {
        *self.variant.lock().unwrap() = Variant::Broken;
    }

    fn set_value(&self, value: &str) -> Result<(), ComponentError> {
        if value == "bad" {
            return Err(ComponentError::IllegalValue(value.to_string()));
        }
        *self.value.lock().unwrap() = value.to_string();
        Ok(())
    }
}

impl Component for Probe {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn schema(&self) -> Cow<'_, str> {
        match *self.variant.lock().unwrap() {
            Variant::Plain => Cow::Borrowed(PROBE_SCHEMA),
            Variant::Extra => Cow::Owned(PROBE_SCHEMA.replacen(
                "[[action]]",
                &format!("{PROBE_EXTRA}[[action]]"),
                1,
            )),
            Variant::Broken => Cow::Borrowed("class = "),
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of::<Self>()
            .getter("value", Probe::value)
            .setter("set_value", Probe::set_value)
            .setter("init_value", |probe, value| {
                *probe.value.lock().unwrap() = format!("init:{value}");
                Ok(())
            })
            .getter("target", |probe| probe.target.lock().unwrap().clone())
            .setter("set_target", |probe, value| {
                *probe.target.lock().unwrap() = value.to_string();
                Ok(())
            })
            .action("echo", |probe| Ok(probe.value()))
            .action("fail", |_| {
                Err(ComponentError::ExecutionFailure("boom".to_string()))
            })
            .build()
    }

    fn receive_event(&self, event: &Event) -> Result<bool, ComponentError> {
        self.received.lock().unwrap().push(event.clone());
        if let Some(journal) = &self.journal {
            journal
                .lock()
                .unwrap()
                .push((self.name(), event.event_type().to_string()));
        }
        if let Some(gate) = &self.gate {
            let _ = gate.entered.lock().unwrap().send(());
            let _ = gate.release.lock().unwrap().recv();
        }
        if event.is_type(PROBE_SET_EVENT) {
            *self.value.lock().unwrap() = event.attribute(VALUE_ATTRIBUTE).to_string();
        }
        match self.reaction {
            Reaction::Ignore => Ok(false),
            Reaction::Handle => Ok(true),
            Reaction::Fail => Err(ComponentError::ExecutionFailure("rejected".to_string())),
            Reaction::Panic => panic!("probe panicked on {}", event.event_type()),
        }
    }

    fn on_activate(&self) -> Result<(), ComponentError> {
        if self.fail_activation {
            return Err(ComponentError::ExecutionFailure("no hardware".to_string()));
        }
        Ok(())
    }

    fn on_stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// A directory with a running dispatcher.
pub(crate) struct Harness {
    pub directory: Arc<Directory>,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAILBOX_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let directory = Arc::new(Directory::default());
        let dispatcher = Dispatcher::spawn(Arc::clone(&directory), capacity).unwrap();
        Self {
            directory,
            dispatcher,
        }
    }

    pub fn bus(&self) -> EventBus {
        self.dispatcher.bus()
    }

    pub fn service(&self) -> ServiceHandle {
        ServiceHandle::new(self.bus(), &self.directory)
    }

    /// Register and activate.
    pub fn add<C: Component>(&self, component: C) -> Arc<C> {
        let component = Arc::new(component);
        let shared: ComponentRef = Arc::clone(&component) as ComponentRef;
        self.directory.register(shared).unwrap();
        component.activate(self.service()).unwrap();
        component
    }

    /// Wait until every queued event has been dispatched, then stop.
    pub fn drain(&mut self) {
        self.dispatcher.stop();
    }
}

/// A service handle backed by a fresh harness.
pub(crate) fn detached_service() -> (ServiceHandle, Harness) {
    let harness = Harness::new();
    (harness.service(), harness)
}
