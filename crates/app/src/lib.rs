//! # homebus-app
//!
//! Application layer — the runtime core and its **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that component implementations and integrations
//!   plug into:
//!   - `Component` — a live, named, addressable unit of behaviour
//!   - `RelationIndex` — answers "which components refer to this id?"
//!   - `FinalEventListener` — observes every event after its dispatch round
//!   - `ComponentFactory` — creates components by class name
//! - Compile declarative component schemas into callable bindings, cached
//!   per type ([`schema`])
//! - Keep the registry of live components ([`directory`])
//! - Deliver events through a bounded mailbox to every component, one event
//!   at a time ([`dispatcher`]), measuring the cost ([`statistics`])
//! - Orchestrate load, activation and shutdown ([`server`]) and expose the
//!   line-based command protocol ([`services::command_line`])
//!
//! ## Dependency rule
//! Depends on `homebus-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod directory;
pub mod dispatcher;
pub mod heartbeat;
pub mod ports;
pub mod proxy;
pub mod relation;
pub mod schema;
pub mod server;
pub mod service;
pub mod services;
pub mod statistics;

#[cfg(test)]
pub(crate) mod testing;
