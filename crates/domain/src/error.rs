//! Common error types used across the workspace.
//!
//! Each concern has its own typed error; [`HomeBusError`] aggregates them via
//! `#[from]` for callers that do not care which layer failed.

/// Failure raised by component code itself (business-logic rejection).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComponentError {
    /// The supplied value was rejected by the component.
    #[error("illegal value: {0}")]
    IllegalValue(String),

    /// The requested operation could not be carried out.
    #[error("execution failed: {0}")]
    ExecutionFailure(String),
}

/// The declarative schema of a component type could not be compiled.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema text is not well formed.
    #[error("malformed schema")]
    Parse(#[source] toml::de::Error),

    /// A declaration refers to a capability the component type does not provide.
    #[error("no capability named `{capability}` in {class}")]
    MissingCapability { capability: String, class: String },

    /// An attribute declares neither `get`, `set` nor `init`.
    #[error("attribute `{attribute}` in {class} binds no capability")]
    UnboundAttribute { attribute: String, class: String },

    /// An attribute or action is declared without a name.
    #[error("unnamed declaration in {class}")]
    EmptyName { class: String },
}

/// Why a component could not be added to the directory.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// The component has an empty name.
    #[error("component has no name")]
    NoName,

    /// Another component already uses this name.
    #[error("name `{0}` is already registered")]
    DuplicateName(String),

    /// Another component already uses this id.
    #[error("id {0} is already registered")]
    DuplicateId(u64),

    /// The component id is 0 (unassigned).
    #[error("component `{0}` has no valid id")]
    InvalidId(String),

    /// The component's schema failed to compile.
    #[error("schema error")]
    Schema(#[from] SchemaError),
}

/// Failure of a direct attribute or action call.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    /// The component type declares no such attribute.
    #[error("no such attribute: {0}")]
    NoSuchAttribute(String),

    /// The component type declares no such action.
    #[error("no such action: {0}")]
    NoSuchAction(String),

    /// The attribute has no `get` capability.
    #[error("attribute `{0}` is write only")]
    NotReadable(String),

    /// The attribute has neither a `set` nor an `init` capability for this path.
    #[error("attribute `{0}` is read only")]
    NotWritable(String),

    /// A binding was invoked on a component of another type.
    #[error("binding invoked on a component of another type")]
    TypeMismatch,

    /// The component rejected the call.
    #[error(transparent)]
    Component(#[from] ComponentError),

    /// The component's schema could not be compiled.
    #[error("schema error")]
    Schema(#[from] SchemaError),
}

/// Why an event could not be handed to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The mailbox is at capacity; the event was dropped.
    #[error("event mailbox is full")]
    MailboxFull,

    /// The dispatcher has shut down.
    #[error("event dispatcher is closed")]
    Closed,
}

/// Aggregated error for callers spanning several layers.
#[derive(Debug, thiserror::Error)]
pub enum HomeBusError {
    #[error("registration failed")]
    Registration(#[from] RegistrationError),

    #[error("invocation failed")]
    Invocation(#[from] InvocationError),

    #[error("send failed")]
    Send(#[from] SendError),

    #[error("schema error")]
    Schema(#[from] SchemaError),

    #[error("component error")]
    Component(#[from] ComponentError),
}
