//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Thin wrappers that ask the [`CliContext`](crate::CliContext) for
//!   adapters, run one operation and format output for the terminal.

pub mod check;
pub mod run;
pub mod say;
pub mod voices;
