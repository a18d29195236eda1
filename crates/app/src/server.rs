//! Home server — owns the directory, the dispatcher and the heartbeat, and
//! orchestrates component load, activation and shutdown.

mod status;

use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use homebus_domain::directory::{DirectoryEntry, is_provisional};
use homebus_domain::error::{RegistrationError, SchemaError, SendError};
use homebus_domain::event::Event;
use homebus_domain::id::ComponentId;
use homebus_domain::record::ComponentRecord;
use homebus_domain::time::{self, Timestamp};

use crate::directory::Directory;
use crate::dispatcher::{DEFAULT_MAILBOX_CAPACITY, Dispatcher, EventBus, FinalListeners};
use crate::heartbeat::Heartbeat;
use crate::ports::{Component, ComponentFactory, ComponentRef, FinalEventListener, RelationIndex};
use crate::proxy::ComponentProxy;
use crate::relation::AttributeRelationIndex;
use crate::schema::SchemaCache;
use crate::service::ServiceHandle;
use crate::statistics::StatisticsSnapshot;

pub use status::{SERVER_CLASS, SERVER_ID};
use status::ServerStatus;

/// Runtime settings for [`HomeServer::start`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Name the server component registers under.
    pub name: String,
    pub mailbox_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: SERVER_CLASS.to_string(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to start the event dispatcher")]
    Spawn(#[from] io::Error),

    #[error("unknown component class `{0}`")]
    UnknownClass(String),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("no async runtime available")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Outcome of [`HomeServer::load`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Components the factory could build.
    pub created: usize,
    pub registered: usize,
    pub activated: usize,
    /// Names (or classes) of records that could not be brought up.
    pub failed: Vec<String>,
}

/// The running system.
pub struct HomeServer {
    directory: Arc<Directory>,
    dispatcher: Mutex<Dispatcher>,
    bus: EventBus,
    listeners: Arc<FinalListeners>,
    factory: Box<dyn ComponentFactory>,
    status: Arc<ServerStatus>,
    heartbeat: Mutex<Option<Heartbeat>>,
    /// Serializes id allocation.
    allocation: Mutex<()>,
}

impl std::fmt::Debug for HomeServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeServer")
            .field("components", &self.directory.len())
            .field("sent_events", &self.bus.sent_count())
            .finish_non_exhaustive()
    }
}

impl HomeServer {
    /// Start with the attribute-based relation index.
    ///
    /// # Errors
    ///
    /// See [`start_with`](Self::start_with).
    pub fn start(
        config: &ServerConfig,
        factory: Box<dyn ComponentFactory>,
    ) -> Result<Self, ServerError> {
        Self::start_with(
            config,
            factory,
            Box::new(AttributeRelationIndex::default()),
        )
    }

    /// Start the dispatcher and register the server's own component.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Spawn`] when the dispatcher thread cannot start.
    #[tracing::instrument(skip(factory, relations))]
    pub fn start_with(
        config: &ServerConfig,
        factory: Box<dyn ComponentFactory>,
        relations: Box<dyn RelationIndex>,
    ) -> Result<Self, ServerError> {
        let started_at: Timestamp = time::now();
        let directory = Arc::new(Directory::new(Arc::new(SchemaCache::new()), relations));
        let dispatcher = Dispatcher::spawn(Arc::clone(&directory), config.mailbox_capacity)?;
        let bus = dispatcher.bus();
        let listeners = Arc::clone(dispatcher.listeners());

        let status = Arc::new(ServerStatus::new(&config.name, bus.clone(), started_at));
        directory.register(Arc::clone(&status) as ComponentRef)?;
        let service = ServiceHandle::new(bus.clone(), &directory);
        if let Err(err) = status.activate(service) {
            tracing::warn!(error = %err, "server component not activated");
        }

        tracing::info!(capacity = config.mailbox_capacity, "home server started");
        Ok(Self {
            directory,
            dispatcher: Mutex::new(dispatcher),
            bus,
            listeners,
            factory,
            status,
            heartbeat: Mutex::new(None),
            allocation: Mutex::new(()),
        })
    }

    /// Create, configure, register and activate components from records.
    ///
    /// Records of the server's own class are skipped. Components are
    /// registered and activated in `(start_order, name)` order; a failure
    /// affects only the component concerned.
    #[tracing::instrument(skip_all, fields(records = records.len()))]
    pub fn load(&self, records: Vec<ComponentRecord>) -> LoadReport {
        let _allocation = lock(&self.allocation);
        let mut report = LoadReport::default();
        let mut prepared = Vec::new();

        for record in records {
            if record.class == SERVER_CLASS {
                tracing::debug!(name = %record.name, "server component is built in, skipping");
                continue;
            }
            let Some(component) = self.factory.create(&record.class) else {
                tracing::warn!(class = %record.class, "could not create component of unknown class");
                report.failed.push(record.class);
                continue;
            };
            component.set_name(&record.name);
            component.set_id(record.id.unwrap_or_default());
            let proxy = match ComponentProxy::open(component, self.directory.schemas(), None) {
                Ok(proxy) => proxy,
                Err(err) => {
                    tracing::warn!(name = %record.name, error = %err, "component schema does not compile");
                    report.failed.push(record.name);
                    continue;
                }
            };
            for (attribute, value) in &record.attributes {
                if let Err(err) = proxy.init(attribute, value) {
                    tracing::warn!(
                        name = %record.name,
                        %attribute,
                        error = %err,
                        "could not initialize attribute"
                    );
                }
            }
            report.created += 1;
            prepared.push(proxy);
        }

        prepared.sort_by(|a, b| {
            (a.schema().start_order(), a.name()).cmp(&(b.schema().start_order(), b.name()))
        });

        let mut next_id = prepared
            .iter()
            .map(ComponentProxy::id)
            .chain(std::iter::once(self.directory.max_id()))
            .max()
            .unwrap_or_default()
            .next();
        for proxy in &prepared {
            if !proxy.id().is_assigned() {
                proxy.component().set_id(next_id);
                next_id = next_id.next();
            }
        }

        let service = self.service();
        for proxy in &prepared {
            let component = proxy.component();
            if let Err(err) = self.directory.register(Arc::clone(component)) {
                tracing::warn!(name = %component.name(), error = %err, "could not register component");
                component.set_id(ComponentId::UNASSIGNED);
                report.failed.push(component.name());
                continue;
            }
            report.registered += 1;
        }

        for proxy in &prepared {
            let component = proxy.component();
            if !component.id().is_assigned() || is_provisional(&component.name()) {
                continue;
            }
            match component.activate(service.clone()) {
                Ok(()) => report.activated += 1,
                Err(err) => {
                    tracing::warn!(name = %component.name(), error = %err, "could not activate component");
                    report.failed.push(component.name());
                }
            }
        }

        tracing::info!(
            "Activated {} of {} components",
            report.activated,
            prepared.len()
        );
        report
    }

    /// Create a new, registered but not activated, component.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::DuplicateName`] when `name` is taken,
    /// [`ServerError::UnknownClass`] when no factory knows `class`, and any
    /// registration failure.
    #[tracing::instrument(skip(self))]
    pub fn create_instance(&self, class: &str, name: &str) -> Result<ComponentProxy, ServerError> {
        let _allocation = lock(&self.allocation);
        if self.directory.find(name).is_some_and(|c| c.name() == name) {
            return Err(RegistrationError::DuplicateName(name.to_string()).into());
        }
        let component = self
            .factory
            .create(class)
            .ok_or_else(|| ServerError::UnknownClass(class.to_string()))?;
        component.set_name(name);
        component.set_id(self.directory.max_id().next());
        self.directory.register(Arc::clone(&component))?;
        tracing::info!(%class, %name, id = %component.id(), "component created");
        Ok(ComponentProxy::open(
            component,
            self.directory.schemas(),
            Some(self.service()),
        )?)
    }

    /// A proxy onto a component, by name or id.
    #[must_use]
    pub fn open_instance(&self, name_or_id: &str) -> Option<ComponentProxy> {
        self.service().open_instance(name_or_id)
    }

    /// Rename a component. `false` when unknown or the new name is taken.
    #[tracing::instrument(skip(self))]
    pub fn rename_instance(&self, from: &str, to: &str) -> bool {
        self.directory.rename(from, to)
    }

    /// Unregister a component, stopping it unless it is provisional.
    #[tracing::instrument(skip(self))]
    pub fn remove_instance(&self, name_or_id: &str) -> bool {
        let Some(component) = self.directory.remove(name_or_id) else {
            return false;
        };
        if !is_provisional(&component.name()) {
            stop_component(&component);
        }
        true
    }

    #[must_use]
    pub fn list_instances(&self, pattern: &str) -> Vec<DirectoryEntry> {
        self.directory.list(pattern)
    }

    /// Every class the factory can create.
    #[must_use]
    pub fn list_classes(&self) -> Vec<String> {
        self.factory.classes()
    }

    /// Current state of every component as records a loader could replay.
    ///
    /// Attributes that can be initialized and read are included.
    #[must_use]
    pub fn snapshot_records(&self) -> Vec<ComponentRecord> {
        self.directory
            .snapshot()
            .iter()
            .filter_map(|component| {
                let proxy =
                    ComponentProxy::open(Arc::clone(component), self.directory.schemas(), None)
                        .ok()?;
                let attributes = proxy
                    .attribute_values()
                    .into_iter()
                    .filter(|attribute| attribute.can_init && !attribute.write_only)
                    .map(|attribute| (attribute.name, attribute.value))
                    .collect();
                Some(ComponentRecord {
                    class: proxy.schema().class_name().to_string(),
                    name: proxy.name(),
                    id: Some(proxy.id()),
                    attributes,
                })
            })
            .collect()
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

    /// The handle components receive on activation.
    #[must_use]
    pub fn service(&self) -> ServiceHandle {
        ServiceHandle::new(self.bus.clone(), &self.directory)
    }

    pub fn register_final_listener(&self, listener: Arc<dyn FinalEventListener>) {
        self.listeners.register(listener);
    }

    pub fn unregister_final_listener(&self, listener: &Arc<dyn FinalEventListener>) -> bool {
        self.listeners.unregister(listener)
    }

    #[must_use]
    pub fn statistics(&self) -> StatisticsSnapshot {
        self.bus.statistics().snapshot()
    }

    pub fn reset_statistics(&self) {
        self.bus.statistics().reset();
    }

    #[must_use]
    pub fn sent_event_count(&self) -> u64 {
        self.bus.sent_count()
    }

    /// Time since start, as `"<d> days <h> hours <m> minutes"`.
    #[must_use]
    pub fn uptime(&self) -> String {
        self.status.uptime()
    }

    /// Start (or restart) the heartbeat on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NoRuntime`] outside a tokio runtime.
    pub fn start_heartbeat(&self, period: Duration) -> Result<(), ServerError> {
        let _runtime = tokio::runtime::Handle::try_current()?;
        let heartbeat = Heartbeat::spawn(self.bus.clone(), period);
        *lock(&self.heartbeat) = Some(heartbeat);
        tracing::debug!(period_secs = period.as_secs_f64(), "heartbeat started");
        Ok(())
    }

    /// Cancel the heartbeat, stop and remove every component, then let the
    /// dispatcher finish what is queued and join it.
    ///
    /// Blocks the calling thread; async callers go through
    /// `spawn_blocking`.
    #[tracing::instrument(skip(self))]
    pub fn shutdown(&self) {
        if let Some(heartbeat) = lock(&self.heartbeat).take() {
            heartbeat.stop();
        }
        let components = self.directory.clear();
        for component in &components {
            if component.is_activated() {
                stop_component(component);
            }
        }
        lock(&self.dispatcher).stop();
        tracing::info!(stopped = components.len(), "home server stopped");
    }
}

fn stop_component(component: &ComponentRef) {
    if catch_unwind(AssertUnwindSafe(|| component.stop())).is_err() {
        tracing::warn!(name = %component.name(), "component panicked while stopping");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::sync::mpsc;

    use homebus_domain::error::InvocationError;

    use super::*;
    use crate::ports::{Component, ComponentCore};
    use crate::schema::Capabilities;
    use crate::testing::Probe;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct Early {
        core: ComponentCore,
    }

    impl Component for Early {
        fn core(&self) -> &ComponentCore {
            &self.core
        }

        fn schema(&self) -> Cow<'_, str> {
            Cow::Borrowed("class = \"Early\"\ncategory = \"Timers\"\nstart_order = 1")
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::default()
        }
    }

    struct TestFactory;

    impl ComponentFactory for TestFactory {
        fn create(&self, class: &str) -> Option<ComponentRef> {
            match class {
                "Probe" => Some(Arc::new(Probe::new("", 0))),
                "Faulty" => Some(Arc::new(Probe::new("", 0).failing_activation())),
                "Early" => Some(Arc::new(Early::default())),
                _ => None,
            }
        }

        fn classes(&self) -> Vec<String> {
            vec!["Probe".into(), "Faulty".into(), "Early".into()]
        }
    }

    fn server() -> HomeServer {
        HomeServer::start(&ServerConfig::default(), Box::new(TestFactory)).unwrap()
    }

    fn id_of(server: &HomeServer, name: &str) -> u64 {
        server.open_instance(name).unwrap().id().get()
    }

    fn is_active(server: &HomeServer, name: &str) -> bool {
        server
            .open_instance(name)
            .unwrap()
            .component()
            .is_activated()
    }

    #[test]
    fn should_register_itself_as_component() {
        let server = server();

        let entries = server.list_instances("");

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, SERVER_CLASS);
        assert_eq!(entries[0].id, SERVER_ID);
        assert_eq!(entries[0].category, "Ports");
        let proxy = server.open_instance("1").unwrap();
        assert_eq!(proxy.get("Version").unwrap(), env!("CARGO_PKG_VERSION"));
        assert_eq!(proxy.get("UpTime").unwrap(), "0 minutes");
        assert!(is_active(&server, SERVER_CLASS));
        server.shutdown();
    }

    #[test]
    fn should_load_in_start_order_and_assign_missing_ids() {
        let server = server();

        let report = server.load(vec![
            ComponentRecord::new("Probe", "b"),
            ComponentRecord::new("Probe", "a").with_id(10),
            ComponentRecord::new("Early", "z"),
        ]);

        assert_eq!(report.created, 3);
        assert_eq!(report.registered, 3);
        assert_eq!(report.activated, 3);
        assert!(report.failed.is_empty());
        let names: Vec<_> = server
            .list_instances("")
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, [SERVER_CLASS, "z", "a", "b"]);
        assert_eq!(id_of(&server, "a"), 10);
        assert_eq!(id_of(&server, "z"), 11);
        assert_eq!(id_of(&server, "b"), 12);
        server.shutdown();
    }

    #[test]
    fn should_apply_saved_attributes_through_init() {
        let server = server();

        server.load(vec![
            ComponentRecord::new("Probe", "a")
                .with_attribute("InitOnly", "3")
                .with_attribute("ReadOnly", "ignored"),
        ]);

        let proxy = server.open_instance("a").unwrap();
        assert_eq!(proxy.get("Value").unwrap(), "init:3");
        server.shutdown();
    }

    #[test]
    fn should_zero_id_of_component_failing_registration() {
        let server = server();

        let report = server.load(vec![
            ComponentRecord::new("Probe", "a").with_id(5),
            ComponentRecord::new("Probe", "b").with_id(5),
        ]);

        assert_eq!(report.registered, 1);
        assert_eq!(report.activated, 1);
        assert_eq!(report.failed, ["b"]);
        assert!(server.open_instance("b").is_none());
        server.shutdown();
    }

    #[test]
    fn should_not_activate_provisional_components() {
        let server = server();

        let report = server.load(vec![ComponentRecord::new("Probe", "#draft")]);

        assert_eq!(report.registered, 1);
        assert_eq!(report.activated, 0);
        assert!(!is_active(&server, "#draft"));
        server.shutdown();
    }

    #[test]
    fn should_keep_component_registered_when_activation_fails() {
        let server = server();

        let report = server.load(vec![
            ComponentRecord::new("Faulty", "broken"),
            ComponentRecord::new("Probe", "fine"),
        ]);

        assert_eq!(report.activated, 1);
        assert_eq!(report.failed, ["broken"]);
        assert!(!is_active(&server, "broken"));
        assert!(is_active(&server, "fine"));
        server.shutdown();
    }

    #[test]
    fn should_skip_unknown_classes_and_server_records() {
        let server = server();

        let report = server.load(vec![
            ComponentRecord::new("Toaster", "t"),
            ComponentRecord::new(SERVER_CLASS, "Old server").with_id(1),
        ]);

        assert_eq!(report.created, 0);
        assert_eq!(report.failed, ["Toaster"]);
        assert_eq!(server.list_instances("").len(), 1);
        server.shutdown();
    }

    #[test]
    fn should_create_instance_without_activating() {
        let server = server();

        let proxy = server.create_instance("Probe", "#new").unwrap();

        assert_eq!(proxy.id(), ComponentId::new(2));
        assert!(!proxy.component().is_activated());
        proxy.set("InitOnly", "4").unwrap();
        assert!(server.rename_instance("#new", "Lamp"));
        proxy.call_action("activate").unwrap();
        assert!(is_active(&server, "Lamp"));
        server.shutdown();
    }

    #[test]
    fn should_refuse_create_with_taken_name_or_unknown_class() {
        let server = server();
        server.create_instance("Probe", "Lamp").unwrap();

        assert!(matches!(
            server.create_instance("Probe", "Lamp"),
            Err(ServerError::Registration(RegistrationError::DuplicateName(_)))
        ));
        assert!(matches!(
            server.create_instance("Toaster", "Other"),
            Err(ServerError::UnknownClass(_))
        ));
        assert_eq!(server.list_instances("").len(), 2);
        server.shutdown();
    }

    #[test]
    fn should_stop_removed_component_unless_provisional() {
        let server = server();
        server.load(vec![ComponentRecord::new("Probe", "Lamp")]);
        let lamp = server.open_instance("Lamp").unwrap().component().clone();
        server.create_instance("Probe", "#draft").unwrap();

        assert!(server.remove_instance("Lamp"));
        assert!(server.remove_instance("#draft"));
        assert!(!server.remove_instance("Lamp"));

        assert!(!lamp.is_activated());
        assert_eq!(server.list_instances("").len(), 1);
        server.shutdown();
    }

    #[test]
    fn should_snapshot_initializable_attributes() {
        let server = server();
        server.load(vec![
            ComponentRecord::new("Probe", "Lamp")
                .with_id(4)
                .with_attribute("Value", "On"),
        ]);

        let records = server.snapshot_records();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].class, SERVER_CLASS);
        assert!(records[0].attributes.is_empty());
        let lamp = &records[1];
        assert_eq!(lamp.class, "Probe");
        assert_eq!(lamp.id, Some(ComponentId::new(4)));
        let names: Vec<_> = lamp.attributes.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["Value", "InitOnly", "Target"]);
        assert_eq!(lamp.attributes[0].1, "On");
        server.shutdown();
    }

    #[test]
    fn should_report_distribution_statistics_through_server_component() {
        let server = server();
        server.load(vec![ComponentRecord::new("Probe", "Lamp")]);
        let (tx, rx) = mpsc::channel();
        server.register_final_listener(Arc::new(move |_: &Event, _: bool| {
            let _ = tx.send(());
        }));

        server.send(server.create_event("Ping", "")).unwrap();
        rx.recv_timeout(WAIT).unwrap();

        let proxy = server.open_instance(SERVER_CLASS).unwrap();
        assert_eq!(proxy.get("SentEventCount").unwrap(), "1");
        let max: f64 = proxy.get("MaxDistributionTime").unwrap().parse().unwrap();
        assert!(max >= 0.0);
        assert!(!proxy.get("MaxItemName").unwrap().is_empty());
        assert_eq!(server.statistics().rounds.count(), 1);

        proxy.call_action("ResetStatistics").unwrap();

        assert_eq!(server.statistics().rounds.count(), 0);
        assert!(matches!(
            proxy.set("Version", "2"),
            Err(InvocationError::NotWritable(_))
        ));
        server.shutdown();
    }

    #[test]
    fn should_stop_everything_on_shutdown() {
        let server = server();
        server.load(vec![ComponentRecord::new("Probe", "Lamp")]);
        let lamp = server.open_instance("Lamp").unwrap().component().clone();

        server.shutdown();

        assert!(!lamp.is_activated());
        assert!(server.list_instances("").is_empty());
        assert_eq!(server.send(Event::new("Late")), Err(SendError::Closed));
    }

    #[test]
    fn should_list_factory_classes() {
        let server = server();
        assert_eq!(server.list_classes(), ["Probe", "Faulty", "Early"]);
        server.shutdown();
    }

    #[test]
    fn should_require_runtime_for_heartbeat() {
        let server = server();
        assert!(matches!(
            server.start_heartbeat(Duration::from_secs(60)),
            Err(ServerError::NoRuntime(_))
        ));
        server.shutdown();
    }

    #[tokio::test]
    async fn should_send_heartbeat_events() {
        let server = server();
        server.start_heartbeat(Duration::from_millis(10)).unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(server.sent_event_count() >= 2);
        server.shutdown();
    }
}
