//! The server's own component: version, traffic and distribution timings.

use std::borrow::Cow;

use homebus_domain::id::ComponentId;
use homebus_domain::time::{self, Timestamp};

use crate::dispatcher::EventBus;
use crate::ports::{Component, ComponentCore};
use crate::schema::Capabilities;
use crate::statistics::as_millis_f64;

/// Class name of the server component.
pub const SERVER_CLASS: &str = "HomeServer";
/// Id the server component always registers under.
pub const SERVER_ID: ComponentId = ComponentId::new(1);

const SCHEMA: &str = r#"
class = "HomeServer"
category = "Ports"

[[attribute]]
name = "Version"
get = "version"
default = true

[[attribute]]
name = "SentEventCount"
get = "sent_event_count"

[[attribute]]
name = "UpTime"
get = "uptime"

[[attribute]]
name = "MaxDistributionTime"
get = "max_distribution_time"

[[attribute]]
name = "AverageDistributionTime"
get = "average_distribution_time"

[[attribute]]
name = "MaxItemTime"
get = "max_item_time"

[[attribute]]
name = "MaxItemName"
get = "max_item_name"

[[attribute]]
name = "CurrentItemTime"
get = "current_item_time"

[[action]]
name = "ResetStatistics"
method = "reset_statistics"
"#;

pub(crate) struct ServerStatus {
    core: ComponentCore,
    bus: EventBus,
    started_at: Timestamp,
}

impl ServerStatus {
    pub(crate) fn new(name: &str, bus: EventBus, started_at: Timestamp) -> Self {
        Self {
            core: ComponentCore::new(name, SERVER_ID),
            bus,
            started_at,
        }
    }

    pub(crate) fn uptime(&self) -> String {
        time::format_uptime(time::now() - self.started_at)
    }

    fn millis(value: std::time::Duration) -> String {
        format!("{:.2}", as_millis_f64(value))
    }
}

impl Component for ServerStatus {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn schema(&self) -> Cow<'_, str> {
        Cow::Borrowed(SCHEMA)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of::<Self>()
            .getter("version", |_| env!("CARGO_PKG_VERSION").to_string())
            .getter("sent_event_count", |status| status.bus.sent_count().to_string())
            .getter("uptime", ServerStatus::uptime)
            .getter("max_distribution_time", |status| {
                Self::millis(status.bus.statistics().snapshot().rounds.max())
            })
            .getter("average_distribution_time", |status| {
                Self::millis(status.bus.statistics().snapshot().rounds.average())
            })
            .getter("max_item_time", |status| {
                Self::millis(status.bus.statistics().snapshot().items.max())
            })
            .getter("max_item_name", |status| {
                status.bus.statistics().snapshot().max_item_name
            })
            .getter("current_item_time", |status| {
                status
                    .bus
                    .statistics()
                    .current_item()
                    .map(|(_, busy)| Self::millis(busy))
                    .unwrap_or_default()
            })
            .action("reset_statistics", |status| {
                status.bus.statistics().reset();
                Ok(String::new())
            })
            .build()
    }
}
