//! Binary-local command handlers.
//!
//! `entry` wires config, logging and the token manager; each subcommand
//! lives in its own module and renders through `RenderSink`.

pub(crate) mod entry;
pub(crate) mod listen;
pub(crate) mod login;
pub(crate) mod migrate;
pub(crate) mod prompts;
