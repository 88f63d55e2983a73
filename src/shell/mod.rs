//! External process execution and platform detection.

pub mod command;
pub mod platform;

pub use command::{execute, render_command, CommandOptions, CommandResult};
pub use platform::{find_program, is_ci};
