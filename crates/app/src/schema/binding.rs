//! Attribute and action bindings of a compiled schema.

use std::fmt;

use homebus_domain::error::InvocationError;

use super::capability::{ActionFn, GetFn, SetFn};
use crate::ports::Component;

/// A declared attribute bound to the component type's capabilities.
#[derive(Clone)]
pub struct AttributeBinding {
    pub(crate) name: String,
    pub(crate) kind: String,
    pub(crate) values: Vec<String>,
    pub(crate) get: Option<GetFn>,
    pub(crate) set: Option<SetFn>,
    /// Resolved init capability: the declared `init`, else `set`.
    pub(crate) init: Option<SetFn>,
}

impl AttributeBinding {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type (`String`, `Item`, `Items`, `Command`, `StringList`...).
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Enumerated values for list-typed attributes.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Readable but not settable at runtime.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.set.is_none() && self.get.is_some()
    }

    #[must_use]
    pub fn is_write_only(&self) -> bool {
        self.get.is_none()
    }

    /// Whether the attribute can receive an initial value.
    #[must_use]
    pub fn can_init(&self) -> bool {
        self.init.is_some()
    }

    /// Read the current value.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::NotReadable`] for write-only attributes.
    pub fn get(&self, component: &dyn Component) -> Result<String, InvocationError> {
        let get = self
            .get
            .as_ref()
            .ok_or_else(|| InvocationError::NotReadable(self.name.clone()))?;
        get(component)
    }

    /// Change the value at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::NotWritable`] when no `set` is declared, or
    /// the component's rejection.
    pub fn set(&self, component: &dyn Component, value: &str) -> Result<(), InvocationError> {
        let set = self
            .set
            .as_ref()
            .ok_or_else(|| InvocationError::NotWritable(self.name.clone()))?;
        set(component, value)
    }

    /// Assign an initial value, before or instead of runtime setting.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::NotWritable`] when neither `init` nor `set`
    /// is declared, or the component's rejection.
    pub fn init(&self, component: &dyn Component, value: &str) -> Result<(), InvocationError> {
        let init = self
            .init
            .as_ref()
            .ok_or_else(|| InvocationError::NotWritable(self.name.clone()))?;
        init(component, value)
    }
}

impl fmt::Debug for AttributeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeBinding")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("read_only", &self.is_read_only())
            .field("write_only", &self.is_write_only())
            .field("can_init", &self.can_init())
            .finish_non_exhaustive()
    }
}

/// A declared action bound to a capability.
#[derive(Clone)]
pub struct ActionBinding {
    pub(crate) name: String,
    pub(crate) call: ActionFn,
}

impl ActionBinding {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the action, returning its result text.
    ///
    /// # Errors
    ///
    /// Propagates the component's failure.
    pub fn call(&self, component: &dyn Component) -> Result<String, InvocationError> {
        (self.call)(component)
    }
}

impl fmt::Debug for ActionBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionBinding")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
