//! Virtual component implementations — lamp, thermometer, lamp group.
//!
//! Lamps and thermometers are addressed like radio devices: inbound events
//! carry an `Address` attribute and only the component configured with that
//! address reacts.

mod lamp;
mod lamp_group;
mod thermometer;

pub use lamp::VirtualLamp;
pub use lamp_group::LampGroup;
pub use thermometer::VirtualThermometer;

/// Event type exchanged with virtual lamps.
pub const MESSAGE_EVENT: &str = "Virtual_Message";
/// Event type carrying virtual thermometer readings.
pub const TEMPERATURE_EVENT: &str = "Virtual_Temperature";

const ADDRESS_ATTRIBUTE: &str = "Address";
const COMMAND_ATTRIBUTE: &str = "Command";
const TEMPERATURE_ATTRIBUTE: &str = "Temperature";

fn on_off(on: bool) -> &'static str {
    if on { "On" } else { "Off" }
}
