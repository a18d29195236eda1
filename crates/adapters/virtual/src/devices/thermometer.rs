//! Virtual thermometer — reports the last reading received for its address.

use std::borrow::Cow;
use std::sync::{Mutex, MutexGuard, PoisonError};

use homebus_app::ports::{Component, ComponentCore};
use homebus_app::schema::Capabilities;
use homebus_domain::error::ComponentError;
use homebus_domain::event::Event;
use homebus_domain::time::{self, Timestamp};

use super::{ADDRESS_ATTRIBUTE, TEMPERATURE_ATTRIBUTE, TEMPERATURE_EVENT};

const SCHEMA: &str = r#"
class = "VirtualThermometer"
category = "Thermometers"

[[attribute]]
name = "Temperature"
get = "temperature"
default = true

[[attribute]]
name = "Address"
get = "address"
set = "set_address"

[[attribute]]
name = "LastUpdate"
get = "last_update"
"#;

#[derive(Debug, Default)]
pub struct VirtualThermometer {
    core: ComponentCore,
    state: Mutex<Reading>,
}

#[derive(Debug, Default)]
struct Reading {
    address: String,
    temperature: Option<f64>,
    updated_at: Option<Timestamp>,
}

impl VirtualThermometer {
    pub const CLASS: &'static str = "VirtualThermometer";

    /// Last reading, `None` before the first one arrives.
    #[must_use]
    pub fn temperature(&self) -> Option<f64> {
        self.lock_state().temperature
    }

    fn lock_state(&self) -> MutexGuard<'_, Reading> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Component for VirtualThermometer {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn schema(&self) -> Cow<'_, str> {
        Cow::Borrowed(SCHEMA)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of::<Self>()
            .getter("temperature", |thermometer| {
                thermometer
                    .temperature()
                    .map(|value| format!("{value:.1}"))
                    .unwrap_or_default()
            })
            .getter("address", |thermometer| {
                thermometer.lock_state().address.clone()
            })
            .setter("set_address", |thermometer, address| {
                thermometer.lock_state().address = address.trim().to_string();
                Ok(())
            })
            .getter("last_update", |thermometer| {
                thermometer
                    .lock_state()
                    .updated_at
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default()
            })
            .build()
    }

    fn receive_event(&self, event: &Event) -> Result<bool, ComponentError> {
        if !event.is_type(TEMPERATURE_EVENT) || !event.is_inbound() {
            return Ok(false);
        }
        let mut state = self.lock_state();
        if state.address.is_empty() || event.attribute(ADDRESS_ATTRIBUTE) != state.address {
            return Ok(false);
        }
        let reading = event.attribute(TEMPERATURE_ATTRIBUTE).trim();
        let Ok(temperature) = reading.parse::<f64>() else {
            return Err(ComponentError::IllegalValue(format!(
                "not a temperature: {reading}"
            )));
        };
        state.temperature = Some(temperature);
        state.updated_at = Some(time::now());
        Ok(true)
    }
}
