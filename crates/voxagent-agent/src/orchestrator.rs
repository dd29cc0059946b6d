//! Conversation orchestrator: the session state machine.
//!
//! ```text
//!   Idle ──start(mode)──▶ ActiveLoop(mode) ──exit / end of input / stop()──▶ Idle
//! ```
//!
//! The orchestrator owns the [`SessionState`] and runs one of three loops
//! sequentially: capture or read input, generate a reply, hand the reply to
//! the [`SpeechQueue`]. Playback runs on the queue's own worker, so the loop
//! never waits for audio except before capturing (half-duplex).
//!
//! [`StopHandle`] lets another task (a Ctrl-C handler) end the session while
//! `start` is running. A stop that arrives before the session starts is kept
//! and ends that session as soon as it begins.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use voxagent_core::{
    AgentMode, AgentSettings, CaptureError, CaptureOptions, ConversationTurn, History,
    SessionError, SessionState, SpeechRecognizer, SpeechRequest, VoicePromptStore,
};
use voxagent_voice::SpeechQueue;

use crate::generator::ResponseGenerator;
use crate::input::{LineSource, StdinLines};

/// Typed commands that end a text session.
const TEXT_EXIT_COMMANDS: [&str; 3] = ["quit", "exit", "stop"];

/// Spoken words that end a voice session.
const VOICE_EXIT_WORDS: [&str; 4] = ["goodbye", "exit", "stop", "quit"];

/// Whether a typed line ends a text session.
#[must_use]
pub fn is_text_exit(line: &str) -> bool {
    let line = line.trim();
    TEXT_EXIT_COMMANDS
        .iter()
        .any(|cmd| line.eq_ignore_ascii_case(cmd))
}

/// Whether a spoken phrase ends a voice session.
#[must_use]
pub fn is_voice_exit(text: &str) -> bool {
    let text = text.to_lowercase();
    VOICE_EXIT_WORDS.iter().any(|word| text.contains(word))
}

/// Case-insensitive substring match for the wake phrase.
#[must_use]
pub fn contains_wake_phrase(text: &str, phrase: &str) -> bool {
    let phrase = phrase.trim().to_lowercase();
    !phrase.is_empty() && text.to_lowercase().contains(&phrase)
}

// ── Events emitted by the orchestrator ─────────────────────────────

/// Session progress, for transcript display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session loop started.
    Started(AgentMode),

    /// The wake phrase was heard.
    WakeWordDetected,

    /// A scripted line (greeting, farewell) was queued for playback.
    Announcement(String),

    /// User input accepted as a turn.
    UserInput(String),

    /// Text submitted for playback in answer to a turn. `fallback` is set
    /// when generation failed and the apology was substituted.
    Reply { text: String, fallback: bool },

    /// Capture failed with a device or service error.
    CaptureFailed(String),

    /// The session loop ended.
    Ended(AgentMode),
}

// ── Configuration ──────────────────────────────────────────────────

/// Session behaviour: identity, capture timings and scripted lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub speaker: String,
    pub wake_phrase: String,
    pub max_history_turns: usize,

    /// Capture while listening for the wake phrase.
    pub wake_capture: CaptureOptions,
    /// Capture for the exchange that follows the wake phrase.
    pub conversation_capture: CaptureOptions,
    /// Capture in voice-interactive mode.
    pub voice_capture: CaptureOptions,

    /// Upper bound on waiting for playback to drain before capturing.
    pub drain_timeout: Duration,

    pub wake_greeting: String,
    pub voice_greeting: String,
    pub farewell: String,
    pub apology: String,
}

impl OrchestratorConfig {
    #[must_use]
    pub fn from_settings(settings: &AgentSettings) -> Self {
        let speech = &settings.speech;
        let agent = &settings.agent;
        let phrase_limit = Duration::from_secs(speech.phrase_limit_secs);

        Self {
            speaker: agent.speaker.clone(),
            wake_phrase: agent.wake_phrase.clone(),
            max_history_turns: agent.max_history_turns,
            wake_capture: CaptureOptions {
                timeout: Duration::from_secs(speech.wake_timeout_secs),
                phrase_time_limit: Duration::from_secs(speech.wake_phrase_limit_secs),
                calibrate: false,
            },
            conversation_capture: CaptureOptions {
                timeout: Duration::from_secs(speech.conversation_timeout_secs),
                phrase_time_limit: phrase_limit,
                calibrate: true,
            },
            voice_capture: CaptureOptions {
                timeout: Duration::from_secs(speech.listen_timeout_secs),
                phrase_time_limit: phrase_limit,
                calibrate: true,
            },
            drain_timeout: settings.playback.drain_timeout(),
            wake_greeting: agent.wake_greeting.clone(),
            voice_greeting: agent.voice_greeting.clone(),
            farewell: agent.farewell.clone(),
            apology: agent.apology.clone(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_settings(&AgentSettings::default())
    }
}

// ── Stop handle ────────────────────────────────────────────────────

/// Cloneable handle that ends the running session.
///
/// A stop requested while no session runs stays pending and ends the next
/// session immediately. Every session re-arms the handle when it ends.
#[derive(Clone)]
pub struct StopHandle {
    token: Arc<Mutex<CancellationToken>>,
    queue: SpeechQueue,
}

impl StopHandle {
    fn new(queue: SpeechQueue) -> Self {
        Self {
            token: Arc::new(Mutex::new(CancellationToken::new())),
            queue,
        }
    }

    /// Cancel the session: abandon any in-progress capture or generation
    /// and flush playback. Idempotent.
    pub fn stop(&self) {
        self.current().cancel();
        self.queue.stop();
    }

    /// Whether a stop is pending or has ended the current session.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.current().is_cancelled()
    }

    fn current(&self) -> CancellationToken {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install a fresh token once a session has ended.
    fn rearm(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = CancellationToken::new();
    }
}

// ── Orchestrator ───────────────────────────────────────────────────

/// Drives a conversation session.
pub struct Orchestrator {
    state: SessionState,
    recognizer: Arc<dyn SpeechRecognizer>,
    generator: ResponseGenerator,
    queue: SpeechQueue,
    prompts: Arc<dyn VoicePromptStore>,
    input: Box<dyn LineSource>,
    config: OrchestratorConfig,
    stop: StopHandle,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl Orchestrator {
    /// Create an idle orchestrator reading typed input from stdin.
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        generator: ResponseGenerator,
        queue: SpeechQueue,
        prompts: Arc<dyn VoicePromptStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let history = History::new(config.max_history_turns);
        Self {
            state: SessionState::new(AgentMode::TextInteractive, history),
            recognizer,
            generator,
            stop: StopHandle::new(queue.clone()),
            queue,
            prompts,
            input: Box::new(StdinLines::new()),
            config,
            events: None,
        }
    }

    /// Read typed input from `input` instead of stdin.
    #[must_use]
    pub fn with_input(mut self, input: Box<dyn LineSource>) -> Self {
        self.input = input;
        self
    }

    /// Report progress as [`SessionEvent`]s.
    ///
    /// Returns the orchestrator and a receiver for its events.
    #[must_use]
    pub fn with_events(mut self) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        (self, rx)
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub const fn history(&self) -> &History {
        &self.state.history
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.running && !self.stop.is_stopped()
    }

    /// End the session, or the next one if none is running. Idempotent.
    pub fn stop(&mut self) {
        self.state.running = false;
        self.stop.stop();
    }

    /// Run a session in `mode` until it ends.
    ///
    /// Refuses to start when the session speaker has no voice profile.
    pub async fn start(&mut self, mode: AgentMode) -> Result<(), SessionError> {
        if self.state.running {
            return Err(SessionError::AlreadyRunning);
        }
        self.ensure_voice_profile()?;

        let token = self.stop.current();
        self.state = SessionState::new(mode, History::new(self.config.max_history_turns));
        self.state.running = true;

        tracing::info!(%mode, speaker = %self.config.speaker, "Session started");
        self.emit(SessionEvent::Started(mode));

        let result = if token.is_cancelled() {
            tracing::info!(%mode, "Stop was requested before the session started");
            Ok(())
        } else {
            match mode {
                AgentMode::WakeWordLoop => {
                    self.run_wake_word_loop(&token).await;
                    Ok(())
                }
                AgentMode::TextInteractive => self.run_text_loop(&token).await,
                AgentMode::VoiceInteractive => {
                    self.run_voice_loop(&token).await;
                    Ok(())
                }
            }
        };

        // Let queued replies and the farewell finish unless stopped.
        self.drain_playback(&token).await;

        self.state.running = false;
        self.stop.rearm();
        tracing::info!(%mode, turns = self.state.history.len(), "Session ended");
        self.emit(SessionEvent::Ended(mode));
        result
    }

    /// Handle one user input: record it, generate a reply and queue the
    /// reply for playback.
    ///
    /// Returns the text submitted for playback, which is the apology when
    /// generation failed. Returns `None` if a stop is pending or arrives
    /// while generating; the user turn is then taken back and any turn it
    /// trimmed is restored. Outside a session this uses the same stop
    /// signal as the next session.
    pub async fn process_turn(&mut self, input: &str) -> Option<String> {
        let token = self.stop.current();
        self.process_turn_with(input, &token).await
    }

    /// Queue `text` for playback in the session speaker's voice.
    pub fn say(&self, text: impl Into<String>) {
        self.queue
            .submit(SpeechRequest::new(text, self.config.speaker.clone()));
    }

    // ── Loops ──────────────────────────────────────────────────────

    async fn run_wake_word_loop(&mut self, token: &CancellationToken) {
        let wake_capture = self.config.wake_capture;
        let conversation_capture = self.config.conversation_capture;

        while self.is_running() {
            let Some(heard) = self.capture(wake_capture, token).await else {
                break;
            };
            let Some(text) = self.accept(heard) else {
                continue;
            };
            if !contains_wake_phrase(&text, &self.config.wake_phrase) {
                tracing::debug!("No wake phrase in captured speech");
                continue;
            }

            tracing::info!("Wake phrase detected");
            self.emit(SessionEvent::WakeWordDetected);
            self.announce(self.config.wake_greeting.clone());

            let Some(heard) = self.capture(conversation_capture, token).await else {
                break;
            };
            if let Some(text) = self.accept(heard) {
                if self.process_turn_with(&text, token).await.is_none() {
                    break;
                }
            }
        }
    }

    async fn run_text_loop(&mut self, token: &CancellationToken) -> Result<(), SessionError> {
        while self.is_running() {
            let line = tokio::select! {
                biased;
                () = token.cancelled() => break,
                line = self.input.next_line() => line?,
            };
            let Some(line) = line else {
                tracing::debug!("End of input");
                break;
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if is_text_exit(line) {
                break;
            }
            if self.process_turn_with(line, token).await.is_none() {
                break;
            }
        }
        Ok(())
    }

    async fn run_voice_loop(&mut self, token: &CancellationToken) {
        let voice_capture = self.config.voice_capture;
        self.announce(self.config.voice_greeting.clone());

        while self.is_running() {
            let Some(heard) = self.capture(voice_capture, token).await else {
                break;
            };
            let Some(text) = self.accept(heard) else {
                continue;
            };
            if is_voice_exit(&text) {
                tracing::info!("Exit keyword heard");
                self.emit(SessionEvent::UserInput(text));
                self.announce(self.config.farewell.clone());
                break;
            }
            if self.process_turn_with(&text, token).await.is_none() {
                break;
            }
        }
    }

    // ── Steps ──────────────────────────────────────────────────────

    async fn process_turn_with(&mut self, input: &str, token: &CancellationToken) -> Option<String> {
        let evicted = self.state.history.push(ConversationTurn::user(input));
        self.emit(SessionEvent::UserInput(input.to_string()));

        let generated = tokio::select! {
            biased;
            () = token.cancelled() => None,
            result = self.generator.generate(&self.state.history) => Some(result),
        };

        let Some(generated) = generated else {
            tracing::debug!("Generation abandoned, rolling back user turn");
            self.state.history.undo_push(evicted);
            return None;
        };

        let (text, fallback) = match generated {
            Ok(reply) => {
                self.state
                    .history
                    .push(ConversationTurn::assistant(reply.clone()));
                (reply, false)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Speaking apology instead of a reply");
                (self.config.apology.clone(), true)
            }
        };

        self.say(text.clone());
        self.emit(SessionEvent::Reply {
            text: text.clone(),
            fallback,
        });
        Some(text)
    }

    /// Capture once, after playback has drained.
    ///
    /// Returns `None` when the session was stopped first.
    async fn capture(
        &self,
        options: CaptureOptions,
        token: &CancellationToken,
    ) -> Option<Result<String, CaptureError>> {
        tokio::select! {
            biased;
            () = token.cancelled() => return None,
            drained = tokio::time::timeout(self.config.drain_timeout, self.queue.wait_idle()) => {
                if drained.is_err() {
                    tracing::warn!("Playback did not drain in time, capturing anyway");
                }
            }
        }

        tokio::select! {
            biased;
            () = token.cancelled() => None,
            result = self.recognizer.capture(options) => Some(result),
        }
    }

    /// Keep captured text; log and drop failures.
    fn accept(&self, result: Result<String, CaptureError>) -> Option<String> {
        match result {
            Ok(text) => Some(text),
            Err(e) if e.is_expected() => {
                tracing::debug!(outcome = %e, "Nothing captured");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Speech capture failed");
                self.emit(SessionEvent::CaptureFailed(e.to_string()));
                None
            }
        }
    }

    fn announce(&self, text: String) {
        self.say(text.clone());
        self.emit(SessionEvent::Announcement(text));
    }

    async fn drain_playback(&self, token: &CancellationToken) {
        if token.is_cancelled() {
            return;
        }
        tokio::select! {
            () = token.cancelled() => {}
            drained = tokio::time::timeout(self.config.drain_timeout, self.queue.wait_idle()) => {
                if drained.is_err() {
                    tracing::warn!("Playback still busy at session end");
                }
            }
        }
    }

    fn ensure_voice_profile(&self) -> Result<(), SessionError> {
        let speaker = &self.config.speaker;
        if self.prompts.lookup(speaker).is_some() {
            return Ok(());
        }
        tracing::error!(%speaker, "No voice profile for session speaker");
        Err(SessionError::MissingVoiceProfile {
            speaker: speaker.clone(),
            setup_hint: self.prompts.setup_hint(speaker),
        })
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_exit_requires_exact_command() {
        assert!(is_text_exit("quit"));
        assert!(is_text_exit("  QUIT "));
        assert!(is_text_exit("Exit"));
        assert!(is_text_exit("stop"));
        assert!(!is_text_exit("please quit"));
        assert!(!is_text_exit("goodbye"));
    }

    #[test]
    fn voice_exit_matches_anywhere() {
        assert!(is_voice_exit("Well, goodbye!"));
        assert!(is_voice_exit("OK STOP now"));
        assert!(is_voice_exit("i want to quit"));
        assert!(!is_voice_exit("tell me a joke"));
    }

    #[test]
    fn wake_phrase_is_case_insensitive_substring() {
        assert!(contains_wake_phrase("Hey Assistant, you there?", "assistant"));
        assert!(!contains_wake_phrase("hey there", "assistant"));
        assert!(!contains_wake_phrase("anything", "  "));
    }

    #[test]
    fn config_follows_settings() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.wake_capture.timeout, Duration::from_secs(5));
        assert_eq!(config.wake_capture.phrase_time_limit, Duration::from_secs(3));
        assert!(!config.wake_capture.calibrate);
        assert_eq!(config.voice_capture.timeout, Duration::from_secs(30));
        assert!(config.voice_capture.calibrate);
        assert_eq!(config.wake_phrase, "assistant");
        assert_eq!(config.max_history_turns, 10);
    }
}
