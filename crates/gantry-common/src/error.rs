//! Common error types for the Gantry control plane.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`GantryError`].
pub type GantryResult<T> = Result<T, GantryError>;

/// Per-call failures across the Gantry control plane.
///
/// Every variant is recoverable: a failed call reports a single textual
/// message to its caller and the service keeps running.
#[derive(Error, Diagnostic, Debug)]
pub enum GantryError {
    /// Command name did not resolve to a handler.
    #[error("No such command: {name}")]
    #[diagnostic(
        code(gantry::dispatch::no_such_command),
        help("Run 'help' for the list of available commands")
    )]
    NoSuchCommand {
        /// The unresolved command name.
        name: String,
    },

    /// Malformed or missing command arguments.
    #[error("{message}")]
    #[diagnostic(code(gantry::dispatch::invalid_arguments))]
    InvalidArguments {
        /// What was wrong with the arguments.
        message: String,
    },

    /// A layer reference matched neither a layer nor a container.
    #[error("No such layer or container: {reference}")]
    #[diagnostic(code(gantry::registry::unresolved_reference))]
    UnresolvedReference {
        /// The reference that failed to resolve.
        reference: String,
    },

    /// Container creation was attempted with an empty layer list.
    #[error("Please specify at least one layer")]
    #[diagnostic(code(gantry::registry::no_layers))]
    NoLayersSpecified,

    /// Container not found.
    #[error("No such container: {id}")]
    #[diagnostic(code(gantry::registry::container_not_found))]
    ContainerNotFound {
        /// The container id that was not found.
        id: String,
    },

    /// The container is already executing its command.
    #[error("Container is already running: {id}")]
    #[diagnostic(
        code(gantry::exec::already_running),
        help("At most one execution per container; wait for the current run to finish")
    )]
    AlreadyRunning {
        /// The container id that rejected the run.
        id: String,
    },

    /// The child process could not be spawned.
    #[error("Failed to start '{command}': {source}")]
    #[diagnostic(code(gantry::exec::spawn))]
    Spawn {
        /// The command that failed to start.
        command: String,
        /// The underlying OS error.
        source: std::io::Error,
    },

    /// The child process exited with a non-success status.
    #[error("Process failed: {status}")]
    #[diagnostic(code(gantry::exec::process_exit))]
    ProcessExit {
        /// The reported exit status.
        status: std::process::ExitStatus,
    },

    /// I/O failure while relaying process output to the caller.
    #[error("Error relaying output: {0}")]
    #[diagnostic(code(gantry::exec::stream_copy))]
    StreamCopy(std::io::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(gantry::io))]
    Io(#[from] std::io::Error),
}
