//! Schema declarations — the declarative description of a component type.
//!
//! A component type publishes its schema as TOML text:
//!
//! ```toml
//! class = "VirtualLamp"
//! category = "Lamps"
//! start_order = 5
//! morphing = false
//!
//! [[attribute]]
//! name = "State"
//! type = "String"
//! get = "state"
//! set = "set_state"
//! default = true
//! values = ["On", "Off"]
//!
//! [[action]]
//! name = "on"
//! method = "turn_on"
//! default = true
//! ```
//!
//! Parsing produces a [`SchemaDecl`]: names of capabilities, not yet bound to
//! anything callable. Binding happens in the application layer.

use std::hash::{DefaultHasher, Hash, Hasher};

use serde::Deserialize;

use crate::error::SchemaError;

/// Start order used when a schema does not declare one.
pub const DEFAULT_START_ORDER: i32 = 5;

/// Built-in attribute exposing the component name.
pub const NAME_ATTRIBUTE: &str = "Name";
/// Built-in attribute exposing the schema text.
pub const MODEL_ATTRIBUTE: &str = "Model";
/// Built-in attribute exposing the component id.
pub const ID_ATTRIBUTE: &str = "ID";

/// Attribute type whose value is the id of another component.
pub const ITEM_TYPE: &str = "Item";
/// Attribute type whose value is a comma separated list of component ids.
pub const ITEMS_TYPE: &str = "Items";
/// Attribute type whose value is a command line (`call,<id>,<action>`).
pub const COMMAND_TYPE: &str = "Command";
/// Attribute type whose value is one of an enumerated list.
pub const STRING_LIST_TYPE: &str = "StringList";

/// Well-known component categories, in display order.
pub const CATEGORIES: [&str; 9] = [
    "Lamps",
    "Timers",
    "Ports",
    "GUI",
    "Hardware",
    "Controls",
    "Gauges",
    "Thermometers",
    "Infrastructure",
];

/// Parsed schema text of a component type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDecl {
    pub class: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_start_order")]
    pub start_order: i32,
    #[serde(default)]
    pub morphing: bool,
    #[serde(default, rename = "attribute")]
    pub attributes: Vec<AttributeDecl>,
    #[serde(default, rename = "action")]
    pub actions: Vec<ActionDecl>,
}

/// One declared attribute.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeDecl {
    pub name: String,
    #[serde(rename = "type", default = "default_attribute_type")]
    pub kind: String,
    #[serde(default)]
    pub get: Option<String>,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default)]
    pub init: Option<String>,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub values: Vec<String>,
}

/// One declared action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionDecl {
    pub name: String,
    pub method: String,
    #[serde(default)]
    pub default: bool,
}

fn default_start_order() -> i32 {
    DEFAULT_START_ORDER
}

fn default_attribute_type() -> String {
    "String".to_string()
}

impl SchemaDecl {
    /// Parse schema text and check declaration-level invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Parse`] for malformed text and
    /// [`SchemaError::EmptyName`] when an attribute or action has no name.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let decl: Self = toml::from_str(text).map_err(SchemaError::Parse)?;
        decl.validate()?;
        Ok(decl)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        let unnamed_attribute = self.attributes.iter().any(|a| a.name.is_empty());
        let unnamed_action = self
            .actions
            .iter()
            .any(|a| a.name.is_empty() || a.method.is_empty());
        if unnamed_attribute || unnamed_action {
            return Err(SchemaError::EmptyName {
                class: self.class.clone(),
            });
        }
        Ok(())
    }
}

/// Hash of a schema text, used to detect morphed instances.
#[must_use]
pub fn schema_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}
