//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use voxagent_core::AgentMode;

/// Command-line interface for the voice conversation agent.
#[derive(Parser)]
#[command(name = "voxagent")]
#[command(about = "Talk to a language model that answers in a cloned voice")]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to the per-user config.toml when present)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// API key for the chat-completions service
    #[arg(long, env = "VOXAGENT_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// API key for the speech-recognition service
    #[arg(long, env = "VOXAGENT_STT_API_KEY", hide_env_values = true, global = true)]
    pub stt_api_key: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start a conversation session
    Run {
        /// Interaction mode: wake-word, text or voice
        #[arg(short, long, default_value = "text")]
        mode: AgentMode,
        /// Speaker whose cloned voice answers (defaults to the configured speaker)
        #[arg(short, long)]
        speaker: Option<String>,
    },

    /// List speakers that have a voice prompt
    Voices,

    /// Verify the chat-completions endpoint and credentials
    Check,

    /// Speak one utterance through the playback queue
    Say {
        /// Text to speak
        text: String,
        /// Speaker whose cloned voice is used
        #[arg(short, long)]
        speaker: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from(["voxagent", "--verbose", "--config", "/tmp/va.toml", "voices"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/va.toml")));
        assert!(matches!(cli.command, Some(Commands::Voices)));
    }

    #[test]
    fn test_run_parses_mode_names() {
        let cli = Cli::parse_from(["voxagent", "run", "--mode", "wake-word", "-s", "alice"]);
        match cli.command {
            Some(Commands::Run { mode, speaker }) => {
                assert_eq!(mode, AgentMode::WakeWordLoop);
                assert_eq!(speaker.as_deref(), Some("alice"));
            }
            _ => panic!("expected run command"),
        }

        assert!(Cli::try_parse_from(["voxagent", "run", "--mode", "shout"]).is_err());
    }

    #[test]
    fn test_run_defaults_to_text_mode() {
        let cli = Cli::parse_from(["voxagent", "run"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Run {
                mode: AgentMode::TextInteractive,
                speaker: None
            })
        ));
    }

    #[test]
    fn test_say_takes_text() {
        let cli = Cli::parse_from(["voxagent", "say", "Hello there."]);
        match cli.command {
            Some(Commands::Say { text, speaker }) => {
                assert_eq!(text, "Hello there.");
                assert!(speaker.is_none());
            }
            _ => panic!("expected say command"),
        }
    }
}
