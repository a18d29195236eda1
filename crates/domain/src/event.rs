//! Event — a typed, attribute-carrying broadcast message.
//!
//! Every event carries a `Type` attribute. All other attributes are free-form
//! string pairs owned by the producer until the event is sent; after that it
//! is shared read-only with every component in the dispatch round.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute key holding the event type.
pub const TYPE_ATTRIBUTE: &str = "Type";
/// Attribute key holding the conventional single value.
pub const VALUE_ATTRIBUTE: &str = "Value";
/// Attribute key holding the name of the producing component.
pub const SENDER_ATTRIBUTE: &str = "Sender";
/// Attribute key distinguishing inbound from internally generated events.
pub const DIRECTION_ATTRIBUTE: &str = "Direction";

/// Event type broadcast once per heartbeat period.
pub const MINUTE_EVENT_TYPE: &str = "MinuteEvent";

/// Whether an event originates outside the system or was generated internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Received from the outside world (a sensor, a remote).
    In,
    /// Generated internally, typically to be transmitted.
    Out,
}

impl Direction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "In",
            Self::Out => "Out",
        }
    }
}

/// A broadcast message: a type tag plus string attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
    attributes: BTreeMap<String, String>,
}

impl Event {
    /// Create an event with only its type set.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(TYPE_ATTRIBUTE.to_string(), event_type.into());
        Self { attributes }
    }

    /// Create an event with a type and a `Value` attribute.
    #[must_use]
    pub fn with_value(event_type: impl Into<String>, value: impl Into<String>) -> Self {
        let mut event = Self::new(event_type);
        event.set_attribute(VALUE_ATTRIBUTE, value);
        event
    }

    /// The event type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        self.attribute(TYPE_ATTRIBUTE)
    }

    /// Whether this event is of the given type.
    #[must_use]
    pub fn is_type(&self, event_type: &str) -> bool {
        self.event_type() == event_type
    }

    /// Attribute value, or `""` when absent.
    #[must_use]
    pub fn attribute(&self, name: &str) -> &str {
        self.attributes.get(name).map_or("", String::as_str)
    }

    /// Attribute parsed as an integer, `0` when absent or malformed.
    #[must_use]
    pub fn attribute_int(&self, name: &str) -> i64 {
        self.attribute(name).trim().parse().unwrap_or(0)
    }

    /// Attribute parsed as a float, `0.0` when absent or malformed.
    #[must_use]
    pub fn attribute_float(&self, name: &str) -> f64 {
        self.attribute(name).trim().parse().unwrap_or(0.0)
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Set (or replace) an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn set_attribute_int(&mut self, name: impl Into<String>, value: i64) {
        self.set_attribute(name, value.to_string());
    }

    pub fn set_attribute_float(&mut self, name: impl Into<String>, value: f64) {
        self.set_attribute(name, value.to_string());
    }

    /// Builder-style variant of [`set_attribute`](Self::set_attribute).
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Names of all attributes, type included, in key order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// The `Direction` attribute, if it holds `In` or `Out`.
    #[must_use]
    pub fn direction(&self) -> Option<Direction> {
        match self.attribute(DIRECTION_ATTRIBUTE) {
            "In" => Some(Direction::In),
            "Out" => Some(Direction::Out),
            _ => None,
        }
    }

    #[must_use]
    pub fn with_direction(self, direction: Direction) -> Self {
        self.attr(DIRECTION_ATTRIBUTE, direction.as_str())
    }

    /// Whether the event came from outside the system.
    #[must_use]
    pub fn is_inbound(&self) -> bool {
        self.direction() == Some(Direction::In)
    }
}

/// Renders as `event,<Type>,<key>,<value>,...` with the type first.
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event,{}", self.event_type())?;
        for (key, value) in &self.attributes {
            if key != TYPE_ATTRIBUTE {
                write!(f, ",{key},{value}")?;
            }
        }
        Ok(())
    }
}
