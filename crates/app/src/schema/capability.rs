//! Per-type capability tables: the named getters, setters and actions a
//! schema may refer to.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use homebus_domain::error::{ComponentError, InvocationError};

use crate::ports::Component;
use crate::ports::component::as_any;

pub(crate) type GetFn =
    Arc<dyn Fn(&dyn Component) -> Result<String, InvocationError> + Send + Sync>;
pub(crate) type SetFn =
    Arc<dyn Fn(&dyn Component, &str) -> Result<(), InvocationError> + Send + Sync>;
pub(crate) type ActionFn =
    Arc<dyn Fn(&dyn Component) -> Result<String, InvocationError> + Send + Sync>;

/// Named, type-erased getters, setters and actions of a component type.
///
/// Built with [`Capabilities::of`], which checks closure signatures against
/// the concrete component type at compile time.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub(crate) getters: HashMap<String, GetFn>,
    pub(crate) setters: HashMap<String, SetFn>,
    pub(crate) actions: HashMap<String, ActionFn>,
}

impl Capabilities {
    /// Start describing the capabilities of component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> CapabilitiesBuilder<T> {
        CapabilitiesBuilder {
            inner: Self::default(),
            _component: PhantomData,
        }
    }

    pub(crate) fn getter(&self, name: &str) -> Option<GetFn> {
        self.getters.get(name).cloned()
    }

    pub(crate) fn setter(&self, name: &str) -> Option<SetFn> {
        self.setters.get(name).cloned()
    }

    pub(crate) fn action(&self, name: &str) -> Option<ActionFn> {
        self.actions.get(name).cloned()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("setters", &self.setters.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Typed builder for [`Capabilities`].
pub struct CapabilitiesBuilder<T> {
    inner: Capabilities,
    _component: PhantomData<fn(&T)>,
}

impl<T: Component> CapabilitiesBuilder<T> {
    #[must_use]
    pub fn getter<F>(mut self, name: &str, get: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        let erased: GetFn =
            Arc::new(move |component: &dyn Component| downcast::<T>(component).map(&get));
        self.inner.getters.insert(name.to_string(), erased);
        self
    }

    #[must_use]
    pub fn setter<F>(mut self, name: &str, set: F) -> Self
    where
        F: Fn(&T, &str) -> Result<(), ComponentError> + Send + Sync + 'static,
    {
        let erased: SetFn = Arc::new(move |component: &dyn Component, value: &str| {
            let target = downcast::<T>(component)?;
            set(target, value).map_err(InvocationError::from)
        });
        self.inner.setters.insert(name.to_string(), erased);
        self
    }

    #[must_use]
    pub fn action<F>(mut self, name: &str, call: F) -> Self
    where
        F: Fn(&T) -> Result<String, ComponentError> + Send + Sync + 'static,
    {
        let erased: ActionFn = Arc::new(move |component: &dyn Component| {
            let target = downcast::<T>(component)?;
            call(target).map_err(InvocationError::from)
        });
        self.inner.actions.insert(name.to_string(), erased);
        self
    }

    #[must_use]
    pub fn build(self) -> Capabilities {
        self.inner
    }
}

fn downcast<T: Component>(component: &dyn Component) -> Result<&T, InvocationError> {
    as_any(component)
        .downcast_ref::<T>()
        .ok_or(InvocationError::TypeMismatch)
}
