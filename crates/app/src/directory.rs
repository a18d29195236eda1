//! Directory — the registry of live components.
//!
//! Components are reachable by name and by id. Registration order is kept
//! and published as an immutable snapshot, which is what the dispatcher
//! iterates: a dispatch round never observes a half-applied mutation.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use homebus_domain::directory::{DirectoryEntry, ListPattern};
use homebus_domain::error::RegistrationError;
use homebus_domain::id::ComponentId;

use crate::ports::{ComponentRef, RelationIndex};
use crate::relation::AttributeRelationIndex;
use crate::schema::SchemaCache;

/// Registry of components, indexed by name and id.
pub struct Directory {
    state: Mutex<DirectoryState>,
    schemas: Arc<SchemaCache>,
}

struct DirectoryState {
    members: Arc<Vec<ComponentRef>>,
    by_name: HashMap<String, ComponentId>,
    by_id: BTreeMap<ComponentId, Member>,
    relations: Box<dyn RelationIndex>,
}

struct Member {
    component: ComponentRef,
    category: String,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new(
            Arc::new(SchemaCache::new()),
            Box::new(AttributeRelationIndex::default()),
        )
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl Directory {
    #[must_use]
    pub fn new(schemas: Arc<SchemaCache>, relations: Box<dyn RelationIndex>) -> Self {
        Self {
            state: Mutex::new(DirectoryState {
                members: Arc::new(Vec::new()),
                by_name: HashMap::new(),
                by_id: BTreeMap::new(),
                relations,
            }),
            schemas,
        }
    }

    /// The schema cache used to compile registered components.
    #[must_use]
    pub fn schemas(&self) -> &Arc<SchemaCache> {
        &self.schemas
    }

    /// Add a component under its current name and id.
    ///
    /// Nothing is changed when registration fails.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::NoName`] for an empty name,
    /// [`RegistrationError::InvalidId`] for id 0, [`RegistrationError::Schema`]
    /// when the schema does not compile, and
    /// [`RegistrationError::DuplicateName`] / [`RegistrationError::DuplicateId`]
    /// when the name or id is already taken.
    pub fn register(&self, component: ComponentRef) -> Result<(), RegistrationError> {
        let name = component.name();
        if name.is_empty() {
            return Err(RegistrationError::NoName);
        }
        let id = component.id();
        if !id.is_assigned() {
            return Err(RegistrationError::InvalidId(name));
        }
        let schema = self.schemas.schema_for(component.as_ref())?;

        let mut state = self.lock();
        if state.by_name.contains_key(&name) {
            return Err(RegistrationError::DuplicateName(name));
        }
        if state.by_id.contains_key(&id) {
            return Err(RegistrationError::DuplicateId(id.get()));
        }

        state.relations.ingest(&component, &schema);
        state.by_name.insert(name.clone(), id);
        state.by_id.insert(
            id,
            Member {
                component: Arc::clone(&component),
                category: schema.category().to_string(),
            },
        );
        Arc::make_mut(&mut state.members).push(component);
        tracing::debug!(%name, %id, class = schema.class_name(), "component registered");
        Ok(())
    }

    /// Look a component up by name first, then by numeric id.
    #[must_use]
    pub fn find(&self, name_or_id: &str) -> Option<ComponentRef> {
        let state = self.lock();
        state
            .resolve(name_or_id)
            .and_then(|id| state.by_id.get(&id))
            .map(|member| Arc::clone(&member.component))
    }

    /// Give a component a new, unused name.
    ///
    /// Returns `false` when the component is unknown or `new_name` is empty
    /// or taken.
    pub fn rename(&self, name_or_id: &str, new_name: &str) -> bool {
        let mut state = self.lock();
        if new_name.is_empty() || state.by_name.contains_key(new_name) {
            return false;
        }
        let Some(id) = state.resolve(name_or_id) else {
            return false;
        };
        let Some(component) = state.by_id.get(&id).map(|m| Arc::clone(&m.component)) else {
            return false;
        };
        let old_name = component.name();
        state.by_name.retain(|_, entry| *entry != id);
        state.by_name.insert(new_name.to_string(), id);
        component.set_name(new_name);
        tracing::debug!(%old_name, %new_name, %id, "component renamed");
        true
    }

    /// Unregister a component, returning it.
    pub fn remove(&self, name_or_id: &str) -> Option<ComponentRef> {
        let mut state = self.lock();
        let id = state.resolve(name_or_id)?;
        let member = state.by_id.remove(&id)?;
        state.by_name.retain(|_, entry| *entry != id);
        state.relations.remove(id);
        Arc::make_mut(&mut state.members)
            .retain(|component| !Arc::ptr_eq(component, &member.component));
        tracing::debug!(name = %member.component.name(), %id, "component removed");
        Some(member.component)
    }

    /// Entries matching a pattern: `""` lists everything, `@related=<id>`
    /// lists the components referring to `<id>`, anything else lists nothing.
    ///
    /// Relation queries read attribute values outside the lock, so getters
    /// may use the directory themselves.
    #[must_use]
    pub fn list(&self, pattern: &str) -> Vec<DirectoryEntry> {
        match ListPattern::parse(pattern) {
            ListPattern::All => {
                let state = self.lock();
                state
                    .members
                    .iter()
                    .filter_map(|component| state.entry(component.id()))
                    .collect()
            }
            ListPattern::RelatedTo(id) => {
                let query = self.lock().relations.related_to(id);
                let related = query();
                let state = self.lock();
                related
                    .into_iter()
                    .filter_map(|related| state.entry(related))
                    .collect()
            }
            ListPattern::Unmatched => Vec::new(),
        }
    }

    /// The ordered member list as of now. Later mutations do not affect it.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<ComponentRef>> {
        Arc::clone(&self.lock().members)
    }

    /// Remove every component, returning them in registration order.
    pub fn clear(&self) -> Vec<ComponentRef> {
        let mut state = self.lock();
        state.by_name.clear();
        state.by_id.clear();
        state.relations.clear();
        let members = std::mem::take(&mut state.members);
        Arc::try_unwrap(members).unwrap_or_else(|shared| shared.as_ref().clone())
    }

    /// Highest registered id, [`ComponentId::UNASSIGNED`] when empty.
    #[must_use]
    pub fn max_id(&self) -> ComponentId {
        self.lock()
            .by_id
            .keys()
            .next_back()
            .copied()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DirectoryState {
    fn resolve(&self, name_or_id: &str) -> Option<ComponentId> {
        if let Some(&id) = self.by_name.get(name_or_id) {
            return Some(id);
        }
        let id = name_or_id.parse::<ComponentId>().ok()?;
        self.by_id.contains_key(&id).then_some(id)
    }

    fn entry(&self, id: ComponentId) -> Option<DirectoryEntry> {
        self.by_id.get(&id).map(|member| DirectoryEntry {
            name: member.component.name(),
            id,
            category: member.category.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use homebus_domain::error::SchemaError;

    use std::borrow::Cow;
    use std::sync::{Weak, mpsc};
    use std::time::Duration;

    use super::*;
    use crate::ports::{Component, ComponentCore};
    use crate::schema::Capabilities;
    use crate::testing::Probe;

    fn probe(name: &str, id: u64) -> ComponentRef {
        Arc::new(Probe::new(name, id))
    }

    const RESOLVER_SCHEMA: &str = r#"
        class = "Resolver"

        [[attribute]]
        name = "Target"
        type = "Item"
        get = "target"
    "#;

    /// Refers to another component by name, resolving it to an id through
    /// the directory whenever its `Item` attribute is read.
    struct Resolver {
        core: ComponentCore,
        directory: Weak<Directory>,
        target: String,
    }

    impl Resolver {
        fn target_id(&self) -> String {
            self.directory
                .upgrade()
                .and_then(|directory| directory.find(&self.target))
                .map(|component| component.id().to_string())
                .unwrap_or_default()
        }
    }

    impl Component for Resolver {
        fn core(&self) -> &ComponentCore {
            &self.core
        }

        fn schema(&self) -> Cow<'_, str> {
            Cow::Borrowed(RESOLVER_SCHEMA)
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::of::<Self>()
                .getter("target", Resolver::target_id)
                .build()
        }
    }

    #[test]
    fn should_find_by_name_and_by_id() {
        let directory = Directory::default();
        directory.register(probe("Hall", 7)).unwrap();

        assert_eq!(directory.find("Hall").unwrap().id(), ComponentId::new(7));
        assert_eq!(directory.find("7").unwrap().name(), "Hall");
        assert!(directory.find("8").is_none());
        assert!(directory.find("Kitchen").is_none());
    }

    #[test]
    fn should_prefer_name_over_id() {
        let directory = Directory::default();
        directory.register(probe("Hall", 7)).unwrap();
        directory.register(probe("7", 8)).unwrap();

        assert_eq!(directory.find("7").unwrap().id(), ComponentId::new(8));
    }

    #[test]
    fn should_reject_empty_name() {
        let directory = Directory::default();
        let result = directory.register(probe("", 1));
        assert!(matches!(result, Err(RegistrationError::NoName)));
        assert!(directory.is_empty());
    }

    #[test]
    fn should_reject_unassigned_id() {
        let directory = Directory::default();
        let result = directory.register(probe("Hall", 0));
        assert!(matches!(result, Err(RegistrationError::InvalidId(_))));
    }

    #[test]
    fn should_reject_duplicate_name_without_mutation() {
        let directory = Directory::default();
        directory.register(probe("Hall", 1)).unwrap();

        let result = directory.register(probe("Hall", 2));

        assert!(matches!(result, Err(RegistrationError::DuplicateName(_))));
        assert_eq!(directory.len(), 1);
        assert!(directory.find("2").is_none());
    }

    #[test]
    fn should_reject_duplicate_id_without_mutation() {
        let directory = Directory::default();
        directory.register(probe("Hall", 1)).unwrap();

        let result = directory.register(probe("Kitchen", 1));

        assert!(matches!(result, Err(RegistrationError::DuplicateId(1))));
        assert!(directory.find("Kitchen").is_none());
        assert_eq!(directory.snapshot().len(), 1);
    }

    #[test]
    fn should_reject_broken_schema() {
        let directory = Directory::default();
        let broken = Probe::new("Hall", 1);
        broken.break_schema();

        let result = directory.register(Arc::new(broken));

        assert!(matches!(
            result,
            Err(RegistrationError::Schema(SchemaError::Parse(_)))
        ));
        assert!(directory.is_empty());
    }

    #[test]
    fn should_rename_and_release_old_name() {
        let directory = Directory::default();
        directory.register(probe("Hall", 1)).unwrap();

        assert!(directory.rename("Hall", "Porch"));

        assert!(directory.find("Hall").is_none());
        let found = directory.find("Porch").unwrap();
        assert_eq!(found.name(), "Porch");
        directory.register(probe("Hall", 2)).unwrap();
    }

    #[test]
    fn should_refuse_rename_to_taken_name() {
        let directory = Directory::default();
        directory.register(probe("Hall", 1)).unwrap();
        directory.register(probe("Porch", 2)).unwrap();

        assert!(!directory.rename("Hall", "Porch"));
        assert!(!directory.rename("Hall", ""));
        assert!(!directory.rename("Attic", "Cellar"));
        assert_eq!(directory.find("1").unwrap().name(), "Hall");
    }

    #[test]
    fn should_rename_by_id() {
        let directory = Directory::default();
        directory.register(probe("Hall", 1)).unwrap();
        assert!(directory.rename("1", "Porch"));
        assert_eq!(directory.find("Porch").unwrap().id(), ComponentId::new(1));
    }

    #[test]
    fn should_remove_from_every_index() {
        let directory = Directory::default();
        directory.register(probe("Hall", 1)).unwrap();
        directory.register(probe("Porch", 2)).unwrap();

        let removed = directory.remove("Hall").unwrap();

        assert_eq!(removed.name(), "Hall");
        assert!(directory.find("Hall").is_none());
        assert!(directory.find("1").is_none());
        assert_eq!(directory.snapshot().len(), 1);
        assert!(directory.remove("Hall").is_none());
    }

    #[test]
    fn should_keep_snapshot_stable_across_mutations() {
        let directory = Directory::default();
        directory.register(probe("Hall", 1)).unwrap();
        let before = directory.snapshot();

        directory.register(probe("Porch", 2)).unwrap();
        directory.remove("Hall");

        assert_eq!(before.len(), 1);
        assert_eq!(before[0].name(), "Hall");
        let after = directory.snapshot();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].name(), "Porch");
    }

    #[test]
    fn should_list_in_registration_order_with_category() {
        let directory = Directory::default();
        directory.register(probe("B", 9)).unwrap();
        directory.register(probe("A", 3)).unwrap();

        let entries = directory.list("");

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["B", "A"]);
        assert_eq!(entries[0].category, "Controls");
        assert!(directory.list("whatever").is_empty());
    }

    #[test]
    fn should_list_related_components() {
        let directory = Directory::default();
        directory.register(probe("Lamp", 1)).unwrap();
        directory
            .register(Arc::new(Probe::new("Switch", 2).with_target("1")))
            .unwrap();
        directory
            .register(Arc::new(Probe::new("Other", 3).with_target("4")))
            .unwrap();

        let related = directory.list("@related=1");

        assert_eq!(related.len(), 1);
        assert_eq!(related[0].name, "Switch");
    }

    #[test]
    fn should_list_related_through_getters_that_use_the_directory() {
        let directory = Arc::new(Directory::default());
        directory.register(probe("Hall", 1)).unwrap();
        let resolver = Resolver {
            core: ComponentCore::default(),
            directory: Arc::downgrade(&directory),
            target: "Hall".to_string(),
        };
        resolver.set_name("Resolver");
        resolver.set_id(ComponentId::new(2));
        directory.register(Arc::new(resolver)).unwrap();

        let (tx, rx) = mpsc::channel();
        let lister = Arc::clone(&directory);
        std::thread::spawn(move || {
            let _ = tx.send(lister.list("@related=1"));
        });
        let related = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("listing should not block on the directory lock");

        assert_eq!(related.len(), 1);
        assert_eq!(related[0].name, "Resolver");
        assert_eq!(directory.snapshot().len(), 2);
    }

    #[test]
    fn should_forget_relations_of_removed_component() {
        let directory = Directory::default();
        directory
            .register(Arc::new(Probe::new("Switch", 2).with_target("1")))
            .unwrap();
        directory.remove("Switch");
        assert!(directory.list("@related=1").is_empty());
    }

    #[test]
    fn should_report_max_id() {
        let directory = Directory::default();
        assert_eq!(directory.max_id(), ComponentId::UNASSIGNED);
        directory.register(probe("A", 4)).unwrap();
        directory.register(probe("B", 2)).unwrap();
        assert_eq!(directory.max_id(), ComponentId::new(4));
    }

    #[test]
    fn should_clear_in_registration_order() {
        let directory = Directory::default();
        directory.register(probe("B", 2)).unwrap();
        directory.register(probe("A", 1)).unwrap();
        let _held = directory.snapshot();

        let cleared = directory.clear();

        let names: Vec<_> = cleared.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["B", "A"]);
        assert!(directory.is_empty());
        assert!(directory.find("A").is_none());
    }
}
