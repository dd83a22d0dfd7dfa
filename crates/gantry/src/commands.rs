//! Command handlers.
//!
//! Each command owns a small clap grammar parsed from its raw argument
//! list. A parse failure (including `--help`) renders the parser's own
//! message to the output stream and the handler succeeds — argument usage
//! text is output, not an error. Failures the grammar cannot express
//! (missing positionals, unknown references) surface through
//! [`GantryError`].

use std::time::Duration;

use clap::Parser;
use gantry_common::human::{human_duration, mib};
use gantry_common::{GantryError, GantryResult};
use tabled::{Table, Tabled};

use crate::dispatch::{Command, Engine};
use crate::stream::CommandIo;

/// Simulated transfer time for `get`.
const DOWNLOAD_DELAY: Duration = Duration::from_secs(2);
/// Simulated transfer time for `put`.
const UPLOAD_DELAY: Duration = Duration::from_secs(1);

/// Parse a command's arguments, rendering any parse outcome (error or
/// requested help) to a string the handler writes back.
fn parse_command<T: Parser>(name: &str, args: &[String]) -> Result<T, String> {
    T::try_parse_from(std::iter::once(name.to_string()).chain(args.iter().cloned()))
        .map_err(|err| err.render().to_string())
}

#[derive(Parser)]
#[command(name = "layers", about = "Show available filesystem layers")]
struct LayersArgs {
    /// Quiet mode: print layer ids only
    #[arg(short = 'q')]
    quiet: bool,

    /// Only show layers with this name
    name: Option<String>,
}

#[derive(Parser)]
#[command(name = "get", about = "Download a layer from a remote location")]
struct GetArgs {
    /// Remote location to download from
    source: Option<String>,
}

#[derive(Parser)]
#[command(name = "put", about = "Upload a layer to a remote location")]
struct PutArgs {
    /// Remote location to upload to
    source: Option<String>,
}

#[derive(Parser)]
#[command(
    name = "export",
    about = "Create a new layer from the changes on a container's filesystem"
)]
struct ExportArgs {
    /// Stream the new layer to the client instead of storing it
    #[arg(short = 's')]
    stream: bool,

    /// Source container
    container: Option<String>,

    /// Name for the new layer
    layer: Option<String>,
}

#[derive(Parser)]
#[command(name = "run", about = "Run a command in a container")]
struct RunArgs {
    /// Add a layer to the filesystem; layers stack in the order given
    #[arg(short = 'l', value_name = "LAYER")]
    layer: Vec<String>,

    /// Command and arguments to execute
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Parser)]
#[command(name = "clone", about = "Duplicate a container")]
struct CloneArgs {
    /// Reset: discard filesystem changes from the source container
    #[arg(short = 'r')]
    reset: bool,

    /// Container to duplicate
    container_id: String,
}

#[derive(Tabled)]
struct LayerRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "SIZE")]
    size: String,
    #[tabled(rename = "ADDED")]
    added: String,
    #[tabled(rename = "SOURCE")]
    source: String,
}

#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "CMD")]
    cmd: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "CREATED")]
    created: String,
    #[tabled(rename = "CHANGES")]
    changes: String,
    #[tabled(rename = "LAYERS")]
    layers: String,
}

fn added_ago(created_at: chrono::DateTime<chrono::Utc>) -> String {
    format!("{} ago", human_duration(chrono::Utc::now() - created_at))
}

impl Engine {
    pub(crate) async fn cmd_help(&self, io: &mut CommandIo, args: &[String]) -> GantryResult<()> {
        if args.is_empty() {
            return self.write_usage(&io.output).await;
        }
        let Some(command) = Command::resolve(&args[0]) else {
            return Err(GantryError::NoSuchCommand {
                name: args[0].clone(),
            });
        };
        Box::pin(self.invoke(command, io, &["--help".to_string()])).await
    }

    pub(crate) async fn cmd_layers(&self, io: &mut CommandIo, args: &[String]) -> GantryResult<()> {
        let parsed: LayersArgs = match parse_command("layers", args) {
            Ok(parsed) => parsed,
            Err(rendered) => {
                io.output.write_str(rendered).await?;
                return Ok(());
            }
        };

        let text = {
            let registry = self.registry.read();
            let matching = registry
                .layers()
                .filter(|layer| parsed.name.as_deref().is_none_or(|name| name == layer.name));
            if parsed.quiet {
                matching.map(|layer| format!("{}\n", layer.id)).collect()
            } else {
                let rows: Vec<LayerRow> = matching
                    .map(|layer| LayerRow {
                        id: layer.id.clone(),
                        name: layer.name.clone(),
                        size: mib(layer.size),
                        added: added_ago(layer.created_at),
                        source: layer.source.clone(),
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        };
        io.output.write_str(text).await?;
        Ok(())
    }

    pub(crate) async fn cmd_get(&self, io: &mut CommandIo, args: &[String]) -> GantryResult<()> {
        let parsed: GetArgs = match parse_command("get", args) {
            Ok(parsed) => parsed,
            Err(rendered) => {
                io.output.write_str(rendered).await?;
                return Ok(());
            }
        };
        let Some(source) = parsed.source else {
            return Err(GantryError::InvalidArguments {
                message: "Not enough arguments".to_string(),
            });
        };

        io.output
            .write_str(format!("Downloading from {source}...\n"))
            .await?;
        tokio::time::sleep(DOWNLOAD_DELAY).await;
        let layer = {
            let mut registry = self.registry.write();
            registry.add_layer(&source, "download", None)
        };
        io.output
            .write_str(format!(
                "New layer: {} {} {}\n",
                layer.id,
                layer.name,
                mib(layer.size)
            ))
            .await?;
        Ok(())
    }

    pub(crate) async fn cmd_put(&self, io: &mut CommandIo, args: &[String]) -> GantryResult<()> {
        let parsed: PutArgs = match parse_command("put", args) {
            Ok(parsed) => parsed,
            Err(rendered) => {
                io.output.write_str(rendered).await?;
                return Ok(());
            }
        };
        let Some(source) = parsed.source else {
            return Err(GantryError::InvalidArguments {
                message: "Not enough arguments".to_string(),
            });
        };

        tokio::time::sleep(UPLOAD_DELAY).await;
        let layer = {
            let mut registry = self.registry.write();
            registry.add_layer(&source, "upload", None)
        };
        io.output
            .write_str(format!(
                "New layer: {} {} {}\n",
                layer.id,
                layer.name,
                mib(layer.size)
            ))
            .await?;
        Ok(())
    }

    pub(crate) async fn cmd_export(&self, io: &mut CommandIo, args: &[String]) -> GantryResult<()> {
        let parsed: ExportArgs = match parse_command("export", args) {
            Ok(parsed) => parsed,
            Err(rendered) => {
                io.output.write_str(rendered).await?;
                return Ok(());
            }
        };
        let (Some(container_ref), Some(layer_name)) = (parsed.container, parsed.layer) else {
            return Err(GantryError::InvalidArguments {
                message: "Not enough arguments".to_string(),
            });
        };
        if parsed.stream {
            tracing::debug!("streaming export requested; only store mode exists");
        }

        let layer = {
            let mut registry = self.registry.write();
            let (id, bytes_changed) = registry
                .container(&container_ref)
                .map(|container| (container.id.clone(), container.bytes_changed))
                .ok_or_else(|| GantryError::ContainerNotFound {
                    id: container_ref.clone(),
                })?;
            registry.add_layer(&layer_name, &format!("export:{id}"), Some(bytes_changed))
        };
        io.output
            .write_str(format!(
                "New layer: {} {} {}\n",
                layer.id,
                layer.name,
                mib(layer.size)
            ))
            .await?;
        Ok(())
    }

    pub(crate) async fn cmd_run(&self, io: &mut CommandIo, args: &[String]) -> GantryResult<()> {
        let parsed: RunArgs = match parse_command("run", args) {
            Ok(parsed) => parsed,
            Err(rendered) => {
                io.output.write_str(rendered).await?;
                return Ok(());
            }
        };
        if parsed.layer.is_empty() {
            return Err(GantryError::NoLayersSpecified);
        }
        let Some((command, command_args)) = parsed.command.split_first() else {
            return Err(GantryError::InvalidArguments {
                message: "No command specified".to_string(),
            });
        };

        let container = {
            let mut registry = self.registry.write();
            registry.add_container(command, command_args, &parsed.layer)?
        };
        tracing::info!(
            container_id = %container.id,
            command = %container.command_line(),
            "running container"
        );
        self.runner
            .run(&container, io.input.take(), io.output.clone())
            .await
    }

    pub(crate) async fn cmd_clone(&self, io: &mut CommandIo, args: &[String]) -> GantryResult<()> {
        let parsed: CloneArgs = match parse_command("clone", args) {
            Ok(parsed) => parsed,
            Err(rendered) => {
                io.output.write_str(rendered).await?;
                return Ok(());
            }
        };
        tracing::debug!(
            container_id = %parsed.container_id,
            reset = parsed.reset,
            "cloning container"
        );

        let (id, command, arguments) = {
            let registry = self.registry.read();
            let source = registry.container(&parsed.container_id).ok_or_else(|| {
                GantryError::ContainerNotFound {
                    id: parsed.container_id.clone(),
                }
            })?;
            (
                source.id.clone(),
                source.command.clone(),
                source.arguments.clone(),
            )
        };

        // Re-enter `run` with the source container as the single layer
        // reference; resolution splices its layer sequence in order.
        let mut run_args = vec!["-l".to_string(), id, "--".to_string(), command];
        run_args.extend(arguments);
        self.cmd_run(io, &run_args).await
    }

    pub(crate) async fn cmd_list(&self, io: &mut CommandIo, _args: &[String]) -> GantryResult<()> {
        let text = {
            let registry = self.registry.read();
            let rows: Vec<ContainerRow> = registry
                .containers()
                .map(|container| ContainerRow {
                    id: container.id.clone(),
                    cmd: container.command_line(),
                    status: if container.is_running() {
                        "Running".to_string()
                    } else {
                        "-".to_string()
                    },
                    created: added_ago(container.created_at),
                    changes: mib(container.bytes_changed),
                    layers: container
                        .layers
                        .iter()
                        .map(|layer| layer.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
                .collect();
            format!("{}\n", Table::new(rows))
        };
        io.output.write_str(text).await?;
        Ok(())
    }
}
