//! Command-line front end for voxagent.
//!
//! [`bootstrap`] is the composition root; [`handlers`] hold one module per
//! subcommand.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary only.
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod handlers;
pub mod parser;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use parser::{Cli, Commands};
