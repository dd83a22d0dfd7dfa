//! Command dispatch.
//!
//! A fixed, closed table maps command names to handlers. Resolution
//! case-normalizes the name (first character upper, remainder lower) and
//! matches it against the table — string-keyed dynamic dispatch without any
//! runtime introspection. Local callers and the RPC facade go through the
//! same [`Engine::dispatch`] entry point.

use std::sync::Arc;

use gantry_common::{GantryError, GantryResult};
use parking_lot::RwLock;

use crate::estimate::ChangeEstimator;
use crate::exec::ProcessRunner;
use crate::registry::Registry;
use crate::stream::{CommandIo, OutputStream};

/// The closed set of dispatchable commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Command summary or per-command usage.
    Help,
    /// List layers.
    Layers,
    /// Download a layer.
    Get,
    /// Upload a layer.
    Put,
    /// Export a container's changes as a new layer.
    Export,
    /// Create and execute a container.
    Run,
    /// Duplicate a container.
    Clone,
    /// List containers.
    List,
}

/// One-line description per command, in the order the summary shows them.
pub(crate) const SUMMARY: &[(&str, &str)] = &[
    ("run", "Run a command in a container"),
    ("clone", "Duplicate a container"),
    ("list", "Display a list of containers"),
    ("layers", "Display a list of layers"),
    ("get", "Download a layer from a remote location"),
    ("put", "Upload a layer to a remote location"),
    ("export", "Extract changes to a container's filesystem into a new layer"),
    ("help", "Display this summary, or the usage of one command"),
];

/// Case-normalize a command name: first character upper, remainder lower.
fn normalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => {
            let mut normalized: String = first.to_uppercase().collect();
            normalized.push_str(&chars.as_str().to_lowercase());
            normalized
        }
        None => String::new(),
    }
}

impl Command {
    /// Resolve a name to a command, or `None` for a dispatch miss.
    #[must_use]
    pub fn resolve(name: &str) -> Option<Self> {
        match normalize(name).as_str() {
            "Help" => Some(Self::Help),
            "Layers" => Some(Self::Layers),
            "Get" => Some(Self::Get),
            "Put" => Some(Self::Put),
            "Export" => Some(Self::Export),
            "Run" => Some(Self::Run),
            "Clone" => Some(Self::Clone),
            "List" => Some(Self::List),
            _ => None,
        }
    }
}

/// The command engine: registry plus process runner behind one dispatch
/// surface.
pub struct Engine {
    pub(crate) registry: Arc<RwLock<Registry>>,
    pub(crate) runner: ProcessRunner,
}

impl Engine {
    /// Create an engine with an empty registry around the given estimator.
    #[must_use]
    pub fn new(estimator: Box<dyn ChangeEstimator>) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::new(estimator))),
            runner: ProcessRunner,
        }
    }

    /// Shared handle to the registry.
    #[must_use]
    pub fn registry(&self) -> Arc<RwLock<Registry>> {
        Arc::clone(&self.registry)
    }

    /// Dispatch a named command.
    ///
    /// An empty name writes the command summary and succeeds — asking for
    /// nothing is a request for help, not a failure.
    ///
    /// # Errors
    ///
    /// [`GantryError::NoSuchCommand`] on a dispatch miss; otherwise
    /// whatever the handler reports.
    pub async fn dispatch(
        &self,
        name: &str,
        io: &mut CommandIo,
        args: &[String],
    ) -> GantryResult<()> {
        if name.is_empty() {
            return self.write_usage(&io.output).await;
        }
        let Some(command) = Command::resolve(name) else {
            return Err(GantryError::NoSuchCommand {
                name: name.to_string(),
            });
        };
        self.invoke(command, io, args).await
    }

    /// Invoke a resolved command. No retries; the handler's reported
    /// failure is the caller's result.
    ///
    /// # Errors
    ///
    /// Whatever the handler reports.
    pub async fn invoke(
        &self,
        command: Command,
        io: &mut CommandIo,
        args: &[String],
    ) -> GantryResult<()> {
        tracing::info!(command = ?command, args = ?args, "invoking command");
        match command {
            Command::Help => self.cmd_help(io, args).await,
            Command::Layers => self.cmd_layers(io, args).await,
            Command::Get => self.cmd_get(io, args).await,
            Command::Put => self.cmd_put(io, args).await,
            Command::Export => self.cmd_export(io, args).await,
            Command::Run => self.cmd_run(io, args).await,
            Command::Clone => self.cmd_clone(io, args).await,
            Command::List => self.cmd_list(io, args).await,
        }
    }

    /// Write the fixed command summary.
    ///
    /// # Errors
    ///
    /// Only if the output stream is closed.
    pub async fn write_usage(&self, output: &OutputStream) -> GantryResult<()> {
        let mut text = String::from(
            "Usage: gantry COMMAND [arg...]\n\nA minimal control plane for containers.\n\nCommands:\n",
        );
        for (name, description) in SUMMARY {
            text.push_str(&format!("    {name:<10}{description}\n"));
        }
        output.write_str(text).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_is_case_insensitive_on_the_first_letter() {
        assert_eq!(Command::resolve("Run"), Some(Command::Run));
        assert_eq!(Command::resolve("run"), Some(Command::Run));
        assert_eq!(Command::resolve("RUN"), Some(Command::Run));
        assert_eq!(Command::resolve("LaYeRs"), Some(Command::Layers));
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        assert_eq!(Command::resolve("attach"), None);
        assert_eq!(Command::resolve(""), None);
        assert_eq!(Command::resolve("--help"), None);
    }

    #[test]
    fn normalize_shapes_names() {
        assert_eq!(normalize("rUN"), "Run");
        assert_eq!(normalize("x"), "X");
        assert_eq!(normalize(""), "");
    }
}
