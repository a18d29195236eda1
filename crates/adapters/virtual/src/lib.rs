//! # homebus-adapter-virtual
//!
//! Virtual/demo integration that provides simulated components for testing
//! and demonstration purposes.
//!
//! ## Provided components
//!
//! | Class | Category | Behaviour |
//! |-------|----------|-----------|
//! | `VirtualLamp` | Lamps | `on` / `off` / `toggle`; follows inbound `Virtual_Message` events for its address |
//! | `VirtualThermometer` | Thermometers | Reports the last inbound `Virtual_Temperature` reading for its address |
//! | `LampGroup` | Lamps | Fans `on` / `off` / `toggle` out to the lamps listed in `Lamps` |
//!
//! ## Dependency rule
//!
//! Depends on `homebus-app` (port traits) and `homebus-domain` only.

mod devices;

use std::sync::Arc;

use homebus_app::ports::{ComponentFactory, ComponentRef};

pub use devices::{
    LampGroup, MESSAGE_EVENT, TEMPERATURE_EVENT, VirtualLamp, VirtualThermometer,
};

/// Creates virtual components by class name.
#[derive(Debug, Default, Clone, Copy)]
pub struct VirtualComponentFactory;

impl ComponentFactory for VirtualComponentFactory {
    fn create(&self, class: &str) -> Option<ComponentRef> {
        let component: ComponentRef = match class {
            VirtualLamp::CLASS => Arc::new(VirtualLamp::default()),
            VirtualThermometer::CLASS => Arc::new(VirtualThermometer::default()),
            LampGroup::CLASS => Arc::new(LampGroup::default()),
            _ => return None,
        };
        Some(component)
    }

    fn classes(&self) -> Vec<String> {
        [
            VirtualLamp::CLASS,
            VirtualThermometer::CLASS,
            LampGroup::CLASS,
        ]
        .iter()
        .map(ToString::to_string)
        .collect()
    }
}
