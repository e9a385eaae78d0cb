//! Command-line front end.

pub mod arg_parser;
pub mod handlers;

pub use arg_parser::{Cli, Commands, CommonArgs};
pub use handlers::{CommandOutput, build_opts, handle_run, run_command};
