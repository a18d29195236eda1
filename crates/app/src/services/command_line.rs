//! Line-based command protocol.
//!
//! A command line is a comma separated list of tokens. Tokens quote `%`,
//! `,`, CR and LF as `%25`, `%2C`, `%0D` and `%0A`. Every command answers
//! `ok[,<token>...]` or `error,<code>,<message>`; `quit` answers nothing and
//! ends the session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use homebus_domain::error::{ComponentError, InvocationError};

use crate::proxy::ComponentProxy;
use crate::server::HomeServer;

/// Split a line into unquoted tokens. Empty tokens are dropped.
#[must_use]
pub fn parse_line(line: &str) -> Vec<String> {
    line.split(',')
        .filter(|token| !token.is_empty())
        .map(unquote)
        .collect()
}

#[must_use]
pub fn quote(token: &str) -> String {
    token
        .replace('%', "%25")
        .replace(',', "%2C")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[must_use]
pub fn unquote(token: &str) -> String {
    token
        .replace("%2C", ",")
        .replace("%0D", "\r")
        .replace("%0A", "\n")
        .replace("%25", "%")
}

/// Join tokens into a command line, quoting each.
#[must_use]
pub fn join_line<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|token| quote(token.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Executes command lines against a server for one session.
#[derive(Debug, Clone)]
pub struct CommandLineExecutor {
    server: Arc<HomeServer>,
    subscribed: Arc<AtomicBool>,
}

impl CommandLineExecutor {
    #[must_use]
    pub fn new(server: Arc<HomeServer>) -> Self {
        Self {
            server,
            subscribed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the session asked to receive dispatched events.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }

    /// The flag `subscribe` / `unsubscribe` toggle, for event forwarders.
    #[must_use]
    pub fn subscription(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.subscribed)
    }

    /// Execute one line. `None` means the session should end.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn execute(&self, line: &str) -> Option<String> {
        let tokens = parse_line(line);
        let mut args = tokens.iter().map(String::as_str);
        let Some(command) = args.next() else {
            return Some("ok".to_string());
        };

        let reply = match command.to_ascii_lowercase().as_str() {
            "quit" => return None,
            "event" => self.send_event(args),
            "dir" => self.dir(args.next().unwrap_or_default()),
            "subscribe" => {
                self.subscribed.store(true, Ordering::Release);
                "ok".to_string()
            }
            "unsubscribe" => {
                self.subscribed.store(false, Ordering::Release);
                "ok".to_string()
            }
            "create" => self.create(args.next(), args.next()),
            "rename" => self.rename(args.next(), args.next()),
            other => self.on_instance(other, args),
        };
        Some(reply)
    }

    fn send_event<'a>(&self, mut args: impl Iterator<Item = &'a str>) -> String {
        let Some(event_type) = args.next() else {
            return error(9, "No Event Type supplied");
        };
        let mut event = self.server.create_event(event_type, "");
        while let Some(attribute) = args.next() {
            let Some(value) = args.next() else {
                return error(
                    10,
                    &format!("No attribute value for Event attribute: {attribute}"),
                );
            };
            event.set_attribute(attribute, value);
        }
        match self.server.send(event) {
            Ok(()) => "ok".to_string(),
            Err(err) => error(16, &format!("Event not sent: {err}")),
        }
    }

    fn dir(&self, pattern: &str) -> String {
        let mut reply = "ok".to_string();
        for entry in self.server.list_instances(pattern) {
            reply.push(',');
            reply.push_str(&quote(&entry.name));
        }
        reply
    }

    fn create(&self, class: Option<&str>, name: Option<&str>) -> String {
        let Some(class) = class else {
            return error(14, "No Class name specified");
        };
        let Some(name) = name else {
            return error(2, "No Instance name specified");
        };
        match self.server.create_instance(class, name) {
            Ok(_) => "ok".to_string(),
            Err(err) => {
                tracing::debug!(%class, %name, error = %err, "create failed");
                error(15, "Could not create instance")
            }
        }
    }

    fn rename(&self, from: Option<&str>, to: Option<&str>) -> String {
        let Some(from) = from else {
            return error(2, "No Instance specified");
        };
        let Some(to) = to else {
            return error(12, "No new name specified");
        };
        if self.server.rename_instance(from, to) {
            "ok".to_string()
        } else {
            error(13, &format!("Failed to rename from {from} to {to}"))
        }
    }

    fn on_instance<'a>(&self, command: &str, mut args: impl Iterator<Item = &'a str>) -> String {
        let Some(instance) = args.next() else {
            return error(2, "No Instance specified");
        };
        let Some(proxy) = self.server.open_instance(instance) else {
            return error(3, "Could not find instance specified");
        };
        match command {
            "get" => get(&proxy, args),
            "set" => set(&proxy, args),
            "call" => match args.next() {
                Some(action) => call(&proxy, action),
                None => error(5, "No action specified"),
            },
            _ => error(6, "Unknown command"),
        }
    }
}

fn get<'a>(proxy: &ComponentProxy, args: impl Iterator<Item = &'a str>) -> String {
    let mut reply = "ok".to_string();
    let mut push = |name: &str, value: &str| {
        reply.push(',');
        reply.push_str(&quote(name));
        reply.push(',');
        reply.push_str(&quote(value));
    };
    let mut requested = args.peekable();
    if requested.peek().is_none() {
        for attribute in proxy.attribute_values() {
            push(&attribute.name, &attribute.value);
        }
    } else {
        for name in requested {
            push(name, &proxy.get(name).unwrap_or_default());
        }
    }
    reply
}

fn set<'a>(proxy: &ComponentProxy, mut args: impl Iterator<Item = &'a str>) -> String {
    while let Some(attribute) = args.next() {
        let Some(value) = args.next() else {
            return error(7, &format!("No attribute value for: {}", quote(attribute)));
        };
        match proxy.set(attribute, value) {
            Ok(()) => {}
            Err(InvocationError::Component(
                ComponentError::IllegalValue(message) | ComponentError::ExecutionFailure(message),
            )) => return error(9, &format!("Illegal value: {message}")),
            Err(_) => return error(8, &format!("Invalid attribute: {}", quote(attribute))),
        }
    }
    "ok".to_string()
}

fn call(proxy: &ComponentProxy, action: &str) -> String {
    match proxy.call_action(action) {
        Ok(value) => format!("ok,{value}"),
        Err(err) => error(10, &err.to_string()),
    }
}

fn error(code: u8, message: &str) -> String {
    format!("error,{code},{message}")
}
