//! Compiles schema text into bound attribute and action tables.

use std::collections::HashMap;

use homebus_domain::error::SchemaError;
use homebus_domain::schema::{SchemaDecl, schema_hash};

use super::binding::{ActionBinding, AttributeBinding};
use super::capability::Capabilities;
use crate::ports::Component;

/// The compiled, callable description of one component type.
///
/// Attribute and action order follows the schema text. When a name is
/// declared twice, lookups resolve to the later declaration.
#[derive(Debug)]
pub struct ComponentTypeSchema {
    class_name: String,
    category: String,
    start_order: i32,
    morphing: bool,
    hash: u64,
    text: String,
    attributes: Vec<AttributeBinding>,
    actions: Vec<ActionBinding>,
    attribute_index: HashMap<String, usize>,
    action_index: HashMap<String, usize>,
    default_attribute: Option<usize>,
    default_action: Option<usize>,
}

impl ComponentTypeSchema {
    /// Compile the schema a component currently publishes.
    ///
    /// # Errors
    ///
    /// See [`compile_text`](Self::compile_text).
    pub fn compile(component: &dyn Component) -> Result<Self, SchemaError> {
        let text = component.schema();
        Self::compile_text(&text, &component.capabilities())
    }

    /// Compile schema text against a set of capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Parse`] for malformed text,
    /// [`SchemaError::MissingCapability`] when a declaration names an unknown
    /// capability and [`SchemaError::UnboundAttribute`] when an attribute
    /// declares neither `get`, `set` nor `init`.
    pub fn compile_text(text: &str, capabilities: &Capabilities) -> Result<Self, SchemaError> {
        let decl = SchemaDecl::parse(text)?;
        let class = decl.class.as_str();
        let missing = |capability: &str| SchemaError::MissingCapability {
            capability: capability.to_string(),
            class: class.to_string(),
        };

        let mut attributes = Vec::with_capacity(decl.attributes.len());
        let mut attribute_index = HashMap::new();
        let mut default_attribute = None;
        for attribute in &decl.attributes {
            if attribute.get.is_none() && attribute.set.is_none() && attribute.init.is_none() {
                return Err(SchemaError::UnboundAttribute {
                    attribute: attribute.name.clone(),
                    class: class.to_string(),
                });
            }
            let get = attribute
                .get
                .as_deref()
                .map(|name| capabilities.getter(name).ok_or_else(|| missing(name)))
                .transpose()?;
            let set = attribute
                .set
                .as_deref()
                .map(|name| capabilities.setter(name).ok_or_else(|| missing(name)))
                .transpose()?;
            let init = match attribute.init.as_deref() {
                Some(name) => Some(capabilities.setter(name).ok_or_else(|| missing(name))?),
                None => set.clone(),
            };

            let position = attributes.len();
            if attribute.default {
                default_attribute = Some(position);
            }
            attribute_index.insert(attribute.name.clone(), position);
            attributes.push(AttributeBinding {
                name: attribute.name.clone(),
                kind: attribute.kind.clone(),
                values: attribute.values.clone(),
                get,
                set,
                init,
            });
        }

        let mut actions = Vec::with_capacity(decl.actions.len());
        let mut action_index = HashMap::new();
        let mut default_action = None;
        for action in &decl.actions {
            let call = capabilities
                .action(&action.method)
                .ok_or_else(|| missing(&action.method))?;
            let position = actions.len();
            if action.default {
                default_action = Some(position);
            }
            action_index.insert(action.name.clone(), position);
            actions.push(ActionBinding {
                name: action.name.clone(),
                call,
            });
        }

        Ok(Self {
            class_name: decl.class.clone(),
            category: decl.category.clone(),
            start_order: decl.start_order,
            morphing: decl.morphing,
            hash: schema_hash(text),
            text: text.to_string(),
            attributes,
            actions,
            attribute_index,
            action_index,
            default_attribute,
            default_action,
        })
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn start_order(&self) -> i32 {
        self.start_order
    }

    /// Whether instances of this type may publish differing schema texts.
    #[must_use]
    pub fn is_morphing(&self) -> bool {
        self.morphing
    }

    /// Hash of the schema text this was compiled from.
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// The schema text this was compiled from.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn attributes(&self) -> &[AttributeBinding] {
        &self.attributes
    }

    #[must_use]
    pub fn actions(&self) -> &[ActionBinding] {
        &self.actions
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeBinding> {
        self.attribute_index
            .get(name)
            .map(|&position| &self.attributes[position])
    }

    #[must_use]
    pub fn action(&self, name: &str) -> Option<&ActionBinding> {
        self.action_index
            .get(name)
            .map(|&position| &self.actions[position])
    }

    /// Name of the attribute marked `default`, if any.
    #[must_use]
    pub fn default_attribute(&self) -> Option<&str> {
        self.default_attribute
            .map(|position| self.attributes[position].name())
    }

    /// Name of the action marked `default`, if any.
    #[must_use]
    pub fn default_action(&self) -> Option<&str> {
        self.default_action
            .map(|position| self.actions[position].name())
    }
}
