//! # gantryd
//!
//! The Gantry daemon: an HTTP RPC facade over the command engine. Inbound
//! requests are translated into `(command, arguments)` calls against the
//! dispatcher and the resulting output is streamed back as plain text.

#![warn(missing_docs)]

pub mod api;
