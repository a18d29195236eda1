//! # homebus-domain
//!
//! Pure domain model for the homebus home automation runtime.
//!
//! ## Responsibilities
//! - Foundational types: component identifiers, error conventions, timestamps
//! - Define **Events** (typed, attribute-carrying broadcast messages)
//! - Define **Schema declarations** (the declarative description of a
//!   component type's attributes and actions, before binding)
//! - Define **Directory entries** (the `(name, id, category)` listing triple)
//! - Define **Component records** (what the loader needs to recreate an instance)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod directory;
pub mod event;
pub mod record;
pub mod schema;
