//! Command trait definition for CLI commands.
//!
//! Every `bamfq` subcommand implements [`Command`]; `enum_dispatch` routes the
//! parsed subcommand enum to the matching implementation.

use anyhow::Result;
use enum_dispatch::enum_dispatch;

/// Trait implemented by all bamfq CLI commands.
///
/// `command_line` is the full invocation as typed, for logging.
#[enum_dispatch]
pub trait Command {
    #[allow(clippy::missing_errors_doc)]
    fn execute(&self, command_line: &str) -> Result<()>;
}
