//! Component proxy — uniform, name-based access to one component's
//! attributes and actions.

use std::sync::Arc;

use homebus_domain::directory::is_provisional;
use homebus_domain::error::{ComponentError, InvocationError, SchemaError};
use homebus_domain::id::ComponentId;
use homebus_domain::schema::{ID_ATTRIBUTE, MODEL_ATTRIBUTE, NAME_ATTRIBUTE};

use crate::ports::ComponentRef;
use crate::schema::{AttributeBinding, ComponentTypeSchema, SchemaCache};
use crate::service::ServiceHandle;

/// Pseudo-action activating a component, valid on every type.
pub const ACTIVATE_ACTION: &str = "activate";

/// One attribute with its current value and access flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue {
    pub name: String,
    pub kind: String,
    /// Empty for write-only attributes.
    pub value: String,
    pub values: Vec<String>,
    pub read_only: bool,
    pub write_only: bool,
    pub can_init: bool,
}

/// A component paired with its compiled schema.
#[derive(Clone)]
pub struct ComponentProxy {
    component: ComponentRef,
    schema: Arc<ComponentTypeSchema>,
    service: Option<ServiceHandle>,
}

impl std::fmt::Debug for ComponentProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentProxy")
            .field("name", &self.component.name())
            .field("id", &self.component.id())
            .field("class", &self.schema.class_name())
            .finish_non_exhaustive()
    }
}

impl ComponentProxy {
    /// Pair a component with its current schema. `service` is what the
    /// `activate` pseudo-action hands over.
    ///
    /// # Errors
    ///
    /// Returns the schema compilation failure.
    pub fn open(
        component: ComponentRef,
        schemas: &SchemaCache,
        service: Option<ServiceHandle>,
    ) -> Result<Self, SchemaError> {
        let schema = schemas.schema_for(component.as_ref())?;
        Ok(Self {
            component,
            schema,
            service,
        })
    }

    #[must_use]
    pub fn component(&self) -> &ComponentRef {
        &self.component
    }

    #[must_use]
    pub fn schema(&self) -> &ComponentTypeSchema {
        &self.schema
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.component.name()
    }

    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.component.id()
    }

    /// Read an attribute. `ID`, `Name` and `Model` are always available.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::NoSuchAttribute`] for undeclared names and
    /// [`InvocationError::NotReadable`] for write-only attributes.
    pub fn get(&self, attribute: &str) -> Result<String, InvocationError> {
        if attribute == ID_ATTRIBUTE {
            return Ok(self.component.id().to_string());
        }
        if let Some(binding) = self.schema.attribute(attribute) {
            return binding.get(self.component.as_ref());
        }
        match attribute {
            NAME_ATTRIBUTE => Ok(self.component.name()),
            MODEL_ATTRIBUTE => Ok(self.schema.text().to_string()),
            _ => Err(InvocationError::NoSuchAttribute(attribute.to_string())),
        }
    }

    /// Every declared attribute in schema order, with its current value.
    #[must_use]
    pub fn attribute_values(&self) -> Vec<AttributeValue> {
        self.schema
            .attributes()
            .iter()
            .map(|binding| AttributeValue {
                name: binding.name().to_string(),
                kind: binding.kind().to_string(),
                value: if binding.is_write_only() {
                    String::new()
                } else {
                    binding.get(self.component.as_ref()).unwrap_or_default()
                },
                values: binding.values().to_vec(),
                read_only: binding.is_read_only(),
                write_only: binding.is_write_only(),
                can_init: binding.can_init(),
            })
            .collect()
    }

    /// Change an attribute. A provisional component (name starting with
    /// `#`) is still being configured, so the init path is used instead.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::NoSuchAttribute`],
    /// [`InvocationError::NotWritable`] or the component's rejection.
    pub fn set(&self, attribute: &str, value: &str) -> Result<(), InvocationError> {
        if is_provisional(&self.component.name()) {
            return self.init(attribute, value);
        }
        self.binding(attribute)?.set(self.component.as_ref(), value)
    }

    /// Assign an initial value through `init` (or `set` when no `init` is
    /// declared).
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub fn init(&self, attribute: &str, value: &str) -> Result<(), InvocationError> {
        self.binding(attribute)?.init(self.component.as_ref(), value)
    }

    /// Invoke a declared action, or the `activate` pseudo-action.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::NoSuchAction`] for undeclared names and
    /// the component's failure otherwise.
    pub fn call_action(&self, action: &str) -> Result<String, InvocationError> {
        if action == ACTIVATE_ACTION {
            return self.activate().map(|()| String::new());
        }
        self.schema
            .action(action)
            .ok_or_else(|| InvocationError::NoSuchAction(action.to_string()))?
            .call(self.component.as_ref())
    }

    fn activate(&self) -> Result<(), InvocationError> {
        let service = self.service.clone().ok_or_else(|| {
            ComponentError::ExecutionFailure("no service to activate with".to_string())
        })?;
        self.component.activate(service)?;
        tracing::info!(
            name = %self.component.name(),
            id = %self.component.id(),
            "component activated"
        );
        Ok(())
    }

    fn binding(&self, attribute: &str) -> Result<&AttributeBinding, InvocationError> {
        self.schema
            .attribute(attribute)
            .ok_or_else(|| InvocationError::NoSuchAttribute(attribute.to_string()))
    }
}
