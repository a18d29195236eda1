//! Relation index port — answers `@related=<id>` directory queries.

use std::sync::Arc;

use homebus_domain::id::ComponentId;

use crate::ports::ComponentRef;
use crate::schema::ComponentTypeSchema;

/// A relation query captured under the directory lock and run after it is
/// released. It may call component code, which may call the directory.
pub type RelationQuery = Box<dyn FnOnce() -> Vec<ComponentId> + Send>;

/// Tracks which components refer to which other components.
///
/// The directory calls every method while holding its own lock, so no method
/// may run component code. Reading attribute values belongs in the returned
/// [`RelationQuery`].
pub trait RelationIndex: Send {
    /// Start tracking a newly registered component.
    fn ingest(&mut self, component: &ComponentRef, schema: &Arc<ComponentTypeSchema>);

    /// Stop tracking a component.
    fn remove(&mut self, id: ComponentId);

    /// A query for the ids of components whose relations reference `id`
    /// (raw text).
    fn related_to(&self, id: &str) -> RelationQuery;

    /// Forget everything.
    fn clear(&mut self);
}
