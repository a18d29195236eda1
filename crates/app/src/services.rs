//! Driving-side services built on top of the server.

pub mod command_line;

pub use command_line::CommandLineExecutor;
