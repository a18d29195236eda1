//! Schema compilation — turning a component's declarative schema text into
//! callable attribute and action bindings.
//!
//! A component names its capabilities in [`Capabilities`]; the schema text
//! refers to those names. [`ComponentTypeSchema::compile`] joins the two and
//! [`SchemaCache`] keeps one compiled result per component type (and per
//! schema variant for morphing types).

mod binding;
mod cache;
mod capability;
mod compiler;

pub use binding::{ActionBinding, AttributeBinding};
pub use cache::SchemaCache;
pub use capability::{Capabilities, CapabilitiesBuilder};
pub use compiler::ComponentTypeSchema;
