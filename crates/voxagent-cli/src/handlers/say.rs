//! Say command handler.
//!
//! Speaks one utterance through the playback queue, which exercises the
//! whole output path: prompt lookup, chunking, synthesis and the speaker.

use anyhow::{Result, bail};
use voxagent_core::{SpeechRequest, VoicePromptStore};
use voxagent_voice::PlaybackEvent;

use crate::bootstrap::CliContext;

pub async fn execute(ctx: &CliContext, text: &str) -> Result<()> {
    let speaker = &ctx.settings.agent.speaker;
    if text.trim().is_empty() {
        bail!("Nothing to say");
    }
    if ctx.prompts.lookup(speaker).is_none() {
        bail!(
            "No voice profile for speaker '{speaker}'. {}",
            ctx.prompts.setup_hint(speaker)
        );
    }

    let (queue, mut events) = ctx.speech_queue()?;
    let request = SpeechRequest::new(text, speaker.clone());
    let id = request.id;
    queue.submit(request);

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                queue.stop();
                return Ok(());
            }
        };

        match event {
            Some(PlaybackEvent::ChunkSkipped { index, error, .. }) => {
                eprintln!("⚠️  Skipped chunk {}: {error}", index + 1);
            }
            Some(PlaybackEvent::RequestFinished { id: done }) if done == id => return Ok(()),
            Some(PlaybackEvent::RequestDropped { id: done, error }) if done == id => {
                bail!("Playback failed: {error}");
            }
            Some(_) => {}
            None => return Ok(()),
        }
    }
}
