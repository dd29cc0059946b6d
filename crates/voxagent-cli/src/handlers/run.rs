//! Run command handler.
//!
//! Starts a conversation session and prints its transcript. Ctrl-C stops the
//! session through the orchestrator's stop handle.

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use voxagent_agent::SessionEvent;
use voxagent_core::AgentMode;

use crate::bootstrap::CliContext;

/// Renders session events as transcript lines.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub agent: String,
    pub wake_phrase: String,
}

impl Transcript {
    pub fn from_context(ctx: &CliContext) -> Self {
        Self {
            agent: ctx.settings.agent.speaker.clone(),
            wake_phrase: ctx.settings.agent.wake_phrase.clone(),
        }
    }

    /// The line to print for `event`, if any.
    pub fn render(&self, event: &SessionEvent) -> Option<String> {
        match event {
            SessionEvent::Started(AgentMode::WakeWordLoop) => Some(format!(
                "Listening for \"{}\". Press Ctrl-C to stop.",
                self.wake_phrase
            )),
            SessionEvent::Started(AgentMode::TextInteractive) => {
                Some("Type a message and press Enter (quit to exit).".to_string())
            }
            SessionEvent::Started(AgentMode::VoiceInteractive) => {
                Some("Listening. Say goodbye to finish.".to_string())
            }
            SessionEvent::WakeWordDetected => Some("(wake phrase detected)".to_string()),
            SessionEvent::Announcement(text) => Some(format!("{}: {text}", self.agent)),
            SessionEvent::UserInput(text) => Some(format!("You: {text}")),
            SessionEvent::Reply { text, .. } => Some(format!("{}: {text}", self.agent)),
            SessionEvent::CaptureFailed(error) => Some(format!("⚠️  {error}")),
            SessionEvent::Ended(_) => Some("Session ended.".to_string()),
        }
    }
}

pub async fn execute(ctx: &CliContext, mode: AgentMode) -> Result<()> {
    let (queue, playback) = ctx.speech_queue()?;
    // Session events carry everything the transcript shows.
    drop(playback);

    let (mut orchestrator, events) = ctx.orchestrator(queue)?.with_events();

    let stop = orchestrator.stop_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping session");
            stop.stop();
        }
    });

    let transcript = Transcript::from_context(ctx);
    let echo_input = mode.uses_microphone();
    let printer = tokio::spawn(print_transcript(events, transcript, echo_input));

    let result = orchestrator.start(mode).await;

    interrupt.abort();
    // Closes the event channel so the printer finishes.
    drop(orchestrator);
    let _ = printer.await;

    result.with_context(|| format!("{mode} session failed"))
}

async fn print_transcript(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    transcript: Transcript,
    echo_input: bool,
) {
    while let Some(event) = events.recv().await {
        // Typed input is already on screen.
        if !echo_input && matches!(event, SessionEvent::UserInput(_)) {
            continue;
        }
        if let Some(line) = transcript.render(&event) {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript() -> Transcript {
        Transcript {
            agent: "alice".into(),
            wake_phrase: "assistant".into(),
        }
    }

    #[test]
    fn replies_are_labelled_with_the_speaker() {
        let line = transcript().render(&SessionEvent::Reply {
            text: "Hello.".into(),
            fallback: false,
        });
        assert_eq!(line.as_deref(), Some("alice: Hello."));
    }

    #[test]
    fn wake_mode_banner_names_the_phrase() {
        let line = transcript()
            .render(&SessionEvent::Started(AgentMode::WakeWordLoop))
            .unwrap();
        assert!(line.contains("\"assistant\""));
    }

    #[test]
    fn user_input_is_prefixed() {
        let line = transcript().render(&SessionEvent::UserInput("hi".into()));
        assert_eq!(line.as_deref(), Some("You: hi"));
    }
}
