//! Virtual lamp — responds to `on`, `off`, `toggle`.

use std::borrow::Cow;
use std::sync::{Mutex, MutexGuard, PoisonError};

use homebus_app::ports::{Component, ComponentCore};
use homebus_app::schema::Capabilities;
use homebus_domain::error::ComponentError;
use homebus_domain::event::{Direction, Event, SENDER_ATTRIBUTE};

use super::{ADDRESS_ATTRIBUTE, COMMAND_ATTRIBUTE, MESSAGE_EVENT, on_off};

const SCHEMA: &str = r#"
class = "VirtualLamp"
category = "Lamps"

[[attribute]]
name = "State"
type = "StringList"
get = "state"
values = ["On", "Off"]
default = true

[[attribute]]
name = "Address"
get = "address"
set = "set_address"

[[action]]
name = "on"
method = "on"

[[action]]
name = "off"
method = "off"

[[action]]
name = "toggle"
method = "toggle"
default = true
"#;

/// A simulated lamp.
///
/// Switching it transmits an outbound `Virtual_Message`; an inbound one
/// addressed to it (a remote control press) switches it.
#[derive(Debug, Default)]
pub struct VirtualLamp {
    core: ComponentCore,
    state: Mutex<LampState>,
}

#[derive(Debug, Default)]
struct LampState {
    on: bool,
    address: String,
}

impl VirtualLamp {
    pub const CLASS: &'static str = "VirtualLamp";

    #[must_use]
    pub fn is_on(&self) -> bool {
        self.lock_state().on
    }

    fn address(&self) -> String {
        self.lock_state().address.clone()
    }

    fn set_address(&self, address: &str) -> Result<(), ComponentError> {
        if address.trim().is_empty() {
            return Err(ComponentError::IllegalValue(
                "address must not be empty".to_string(),
            ));
        }
        self.lock_state().address = address.trim().to_string();
        Ok(())
    }

    fn switch(&self, command: Command) {
        let (on, address) = {
            let mut state = self.lock_state();
            state.on = match command {
                Command::On => true,
                Command::Off => false,
                Command::Toggle => !state.on,
            };
            (state.on, state.address.clone())
        };
        self.transmit(on, &address);
    }

    fn transmit(&self, on: bool, address: &str) {
        let Some(service) = self.core.service() else {
            return;
        };
        let event = Event::new(MESSAGE_EVENT)
            .attr(ADDRESS_ATTRIBUTE, address)
            .attr(COMMAND_ATTRIBUTE, on_off(on))
            .attr(SENDER_ATTRIBUTE, self.name())
            .with_direction(Direction::Out);
        if let Err(err) = service.send(event) {
            tracing::warn!(lamp = %self.name(), error = %err, "lamp message not sent");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LampState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy)]
enum Command {
    On,
    Off,
    Toggle,
}

impl Command {
    fn parse(text: &str) -> Option<Self> {
        match text {
            "On" => Some(Self::On),
            "Off" => Some(Self::Off),
            "Toggle" => Some(Self::Toggle),
            _ => None,
        }
    }
}

impl Component for VirtualLamp {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn schema(&self) -> Cow<'_, str> {
        Cow::Borrowed(SCHEMA)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of::<Self>()
            .getter("state", |lamp| on_off(lamp.is_on()).to_string())
            .getter("address", VirtualLamp::address)
            .setter("set_address", VirtualLamp::set_address)
            .action("on", |lamp| {
                lamp.switch(Command::On);
                Ok(String::new())
            })
            .action("off", |lamp| {
                lamp.switch(Command::Off);
                Ok(String::new())
            })
            .action("toggle", |lamp| {
                lamp.switch(Command::Toggle);
                Ok(String::new())
            })
            .build()
    }

    fn receive_event(&self, event: &Event) -> Result<bool, ComponentError> {
        if !event.is_type(MESSAGE_EVENT) || !event.is_inbound() {
            return Ok(false);
        }
        let mut state = self.lock_state();
        if state.address.is_empty() || event.attribute(ADDRESS_ATTRIBUTE) != state.address {
            return Ok(false);
        }
        let Some(command) = Command::parse(event.attribute(COMMAND_ATTRIBUTE)) else {
            return Ok(false);
        };
        state.on = match command {
            Command::On => true,
            Command::Off => false,
            Command::Toggle => !state.on,
        };
        tracing::debug!(lamp = %self.name(), on = state.on, "lamp switched by message");
        Ok(true)
    }
}
