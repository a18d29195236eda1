//! Default relation index — derives relations from typed attributes.
//!
//! A component refers to `<id>` when one of its attributes of type
//! - `Item` holds exactly `<id>`,
//! - `Items` holds a comma separated list containing `<id>`,
//! - `Command` holds a command line whose second field is `<id>`.
//!
//! Values are read at query time, so changes made after registration are
//! reflected without re-ingesting.

use std::sync::Arc;

use homebus_domain::id::ComponentId;
use homebus_domain::schema::{COMMAND_TYPE, ITEM_TYPE, ITEMS_TYPE};

use crate::ports::{ComponentRef, RelationIndex, RelationQuery};
use crate::schema::ComponentTypeSchema;

#[derive(Default)]
pub struct AttributeRelationIndex {
    sources: Vec<Arc<RelationSource>>,
}

struct RelationSource {
    component: ComponentRef,
    schema: Arc<ComponentTypeSchema>,
    attributes: Vec<(usize, RelationKind)>,
}

#[derive(Clone, Copy)]
enum RelationKind {
    Item,
    Items,
    Command,
}

impl RelationKind {
    fn of(kind: &str) -> Option<Self> {
        match kind {
            ITEM_TYPE => Some(Self::Item),
            ITEMS_TYPE => Some(Self::Items),
            COMMAND_TYPE => Some(Self::Command),
            _ => None,
        }
    }

    fn refers_to(self, value: &str, id: &str) -> bool {
        match self {
            Self::Item => value == id,
            Self::Items => value.split(',').any(|part| part.trim() == id),
            Self::Command => value.split(',').nth(1).is_some_and(|part| part == id),
        }
    }
}

impl RelationSource {
    fn refers_to(&self, id: &str) -> bool {
        self.attributes.iter().any(|&(position, kind)| {
            self.schema.attributes()[position]
                .get(self.component.as_ref())
                .is_ok_and(|value| kind.refers_to(&value, id))
        })
    }
}

impl RelationIndex for AttributeRelationIndex {
    fn ingest(&mut self, component: &ComponentRef, schema: &Arc<ComponentTypeSchema>) {
        let attributes: Vec<_> = schema
            .attributes()
            .iter()
            .enumerate()
            .filter(|(_, attribute)| !attribute.is_write_only())
            .filter_map(|(position, attribute)| {
                RelationKind::of(attribute.kind()).map(|kind| (position, kind))
            })
            .collect();
        if attributes.is_empty() {
            return;
        }
        self.sources.push(Arc::new(RelationSource {
            component: Arc::clone(component),
            schema: Arc::clone(schema),
            attributes,
        }));
    }

    fn remove(&mut self, id: ComponentId) {
        self.sources.retain(|source| source.component.id() != id);
    }

    fn related_to(&self, id: &str) -> RelationQuery {
        let sources = self.sources.clone();
        let id = id.to_string();
        Box::new(move || {
            sources
                .iter()
                .filter(|source| source.refers_to(&id))
                .map(|source| source.component.id())
                .collect()
        })
    }

    fn clear(&mut self) {
        self.sources.clear();
    }
}
