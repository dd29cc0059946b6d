//! Voices command handler.

use anyhow::Result;
use voxagent_core::VoicePromptStore;

use crate::bootstrap::CliContext;

/// List the speakers that have a voice prompt, marking the default one.
pub fn execute(ctx: &CliContext) -> Result<()> {
    let default_speaker = &ctx.settings.agent.speaker;
    let voices = ctx.prompts.list_voices();

    if voices.is_empty() {
        println!("No voice prompts in {}", ctx.prompts.models_dir().display());
        println!("{}", ctx.prompts.setup_hint(default_speaker));
        return Ok(());
    }

    for voice in voices {
        if &voice == default_speaker {
            println!("{voice} (default)");
        } else {
            println!("{voice}");
        }
    }
    Ok(())
}
