//! CLI entry point - the composition root.
//!
//! Loads `.env`, parses arguments, initializes logging, bootstraps the
//! adapters and dispatches to a handler.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use voxagent_cli::{Cli, CliConfig, Commands, bootstrap, handlers};

/// Log to stderr so the transcript on stdout stays readable.
/// `RUST_LOG` wins over the verbosity flag.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads its `env` fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let mut ctx = bootstrap(&CliConfig::from_cli(&cli))?;

    match command {
        Commands::Run { mode, speaker } => {
            ctx.set_speaker(speaker.clone());
            handlers::run::execute(&ctx, *mode).await?;
        }
        Commands::Voices => {
            handlers::voices::execute(&ctx)?;
        }
        Commands::Check => {
            handlers::check::execute(&ctx).await?;
        }
        Commands::Say { text, speaker } => {
            ctx.set_speaker(speaker.clone());
            handlers::say::execute(&ctx, text).await?;
        }
    }

    Ok(())
}
