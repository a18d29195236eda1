//! Lamp group — switches a list of lamps together.

use std::borrow::Cow;
use std::sync::{Mutex, MutexGuard, PoisonError};

use homebus_app::ports::{Component, ComponentCore};
use homebus_app::schema::Capabilities;
use homebus_domain::error::ComponentError;

use super::on_off;

const SCHEMA: &str = r#"
class = "LampGroup"
category = "Lamps"
start_order = 6

[[attribute]]
name = "State"
get = "state"
default = true

[[attribute]]
name = "Lamps"
type = "Items"
get = "lamps"
set = "set_lamps"

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

/// Forwards `on` / `off` to every member lamp, by id or name.
///
/// Members are listed in the `Lamps` attribute, which makes the group show
/// up in `@related=<lamp id>` listings.
#[derive(Debug, Default)]
pub struct LampGroup {
    core: ComponentCore,
    state: Mutex<GroupState>,
}

#[derive(Debug, Default)]
struct GroupState {
    members: Vec<String>,
    on: bool,
}

impl LampGroup {
    pub const CLASS: &'static str = "LampGroup";

    fn members(&self) -> String {
        self.lock_state().members.join(",")
    }

    fn set_members(&self, list: &str) -> Result<(), ComponentError> {
        self.lock_state().members = list
            .split(',')
            .map(str::trim)
            .filter(|member| !member.is_empty())
            .map(ToString::to_string)
            .collect();
        Ok(())
    }

    fn switch(&self, on: bool) -> Result<String, ComponentError> {
        let service = self.core.service().ok_or_else(|| {
            ComponentError::ExecutionFailure("lamp group is not activated".to_string())
        })?;
        let members = {
            let mut state = self.lock_state();
            state.on = on;
            state.members.clone()
        };
        let action = if on { "on" } else { "off" };
        for member in &members {
            let Some(lamp) = service.open_instance(member) else {
                tracing::warn!(group = %self.name(), %member, "group member not found");
                continue;
            };
            if let Err(err) = lamp.call_action(action) {
                tracing::warn!(group = %self.name(), %member, error = %err, "group member failed");
            }
        }
        Ok(String::new())
    }

    fn lock_state(&self) -> MutexGuard<'_, GroupState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Component for LampGroup {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn schema(&self) -> Cow<'_, str> {
        Cow::Borrowed(SCHEMA)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of::<Self>()
            .getter("state", |group| on_off(group.lock_state().on).to_string())
            .getter("lamps", LampGroup::members)
            .setter("set_lamps", LampGroup::set_members)
            .action("on", |group| group.switch(true))
            .action("off", |group| group.switch(false))
            .action("toggle", |group| {
                let on = group.lock_state().on;
                group.switch(!on)
            })
            .build()
    }
}
