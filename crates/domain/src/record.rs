//! Persisted description of one component instance.

use serde::{Deserialize, Serialize};

use crate::id::ComponentId;

/// What the loader needs to recreate a component: its class, identity and
/// the initial attribute values, in the order they must be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub class: String,
    pub name: String,
    /// `None` lets the loader assign the next free id.
    #[serde(default)]
    pub id: Option<ComponentId>,
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
}

impl ComponentRecord {
    #[must_use]
    pub fn new(class: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
            id: None,
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<ComponentId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_attribute_order() {
        let record = ComponentRecord::new("Lamp", "Hall")
            .with_id(3)
            .with_attribute("B", "2")
            .with_attribute("A", "1");
        assert_eq!(record.id, Some(ComponentId::new(3)));
        assert_eq!(
            record.attributes,
            [
                ("B".to_string(), "2".to_string()),
                ("A".to_string(), "1".to_string())
            ]
        );
    }

    #[test]
    fn should_default_to_unassigned_id() {
        let record: ComponentRecord =
            serde_json::from_str(r#"{"class":"Lamp","name":"Hall"}"#).unwrap();
        assert_eq!(record.id, None);
        assert!(record.attributes.is_empty());
    }
}
