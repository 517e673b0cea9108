//! Command trait for mise-seq CLI
//!
//! Every subcommand that works on a loaded configuration implements
//! [`Command`], receiving the shared [`RuntimeContext`].

use crate::common::RuntimeContext;
use crate::error::Result;

/// Trait for all configuration-driven commands
///
/// Commands can specify their return type via the `Output` associated type.
/// Most commands return `()`.
///
/// # Example
///
/// ```rust,ignore
/// use crate::command::Command;
/// use crate::common::RuntimeContext;
/// use crate::error::Result;
/// use clap::Args;
///
/// #[derive(Debug, Args)]
/// pub struct MyCommand;
///
/// impl Command for MyCommand {
///     type Output = ();
///
///     fn execute(&self, context: &RuntimeContext) -> Result<()> {
///         // Access config: context.config
///         // Access hook state: context.store
///         Ok(())
///     }
/// }
/// ```
pub trait Command {
    /// The type returned by this command
    type Output;

    /// Execute the command with the given runtime context
    ///
    /// # Errors
    ///
    /// Returns a `CommandError` if the command fails. Error messages should
    /// be descriptive enough for the user to act on.
    fn execute(&self, context: &RuntimeContext) -> Result<Self::Output>;
}
