//! Port definitions — traits that components and integrations implement.
//!
//! Ports are the boundaries between the runtime core and the code plugged
//! into it. They are defined here (in `app`) so that both the core and the
//! adapter crates can depend on them without creating circular dependencies.

pub mod component;
pub mod factory;
pub mod listener;
pub mod relation;

pub use component::{Component, ComponentCore, ComponentRef};
pub use factory::ComponentFactory;
pub use listener::FinalEventListener;
pub use relation::{RelationIndex, RelationQuery};
