//! # Gantry engine
//!
//! The command engine of the Gantry control plane: an in-memory registry of
//! layers and containers, a closed command-dispatch table, and a process
//! runner that executes a container's command and streams its output back
//! to the caller.
//!
//! ## Usage
//!
//! ```no_run
//! use gantry::{CommandIo, Engine, EntropyEstimator, OutputStream};
//!
//! # async fn example() -> gantry_common::GantryResult<()> {
//! let engine = Engine::new(Box::new(EntropyEstimator));
//! engine.registry().write().add_layer("base", "download", None);
//!
//! let (output, _rx) = OutputStream::channel(64);
//! let mut io = CommandIo::new(None, output);
//! engine
//!     .dispatch("run", &mut io, &["-l".into(), "base".into(), "--".into(), "true".into()])
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod dispatch;
pub mod estimate;
pub mod exec;
pub mod registry;
pub mod stream;

mod commands;

pub use dispatch::{Command, Engine};
pub use estimate::{ChangeEstimator, EntropyEstimator, FixedEstimator};
pub use exec::ProcessRunner;
pub use registry::{Container, Layer, Registry};
pub use stream::{CommandIo, InputStream, OutputStream};
