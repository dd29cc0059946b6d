//! Integration tests for the conversation orchestrator.
//!
//! The recognizer, chat service, synthesizer and speaker are hand-written
//! mocks that return canned responses, so every session loop can be driven
//! end to end without a microphone, network access or audio hardware. Time
//! is paused; playback delays only order events.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use voxagent_agent::{
    GeneratorConfig, Orchestrator, OrchestratorConfig, ResponseGenerator, ScriptedLines,
    SessionEvent, StopHandle,
};
use voxagent_core::{
    AgentMode, AudioOutput, CaptureError, CaptureOptions, ChatCompletion, ChatRequest,
    GenerationError, PlaybackError, Role, SessionError, SpeechRecognizer, SynthesisError,
    SynthesizedAudio, VoicePrompt, VoicePromptStore, VoiceSynthesizer,
};
use voxagent_voice::SpeechQueue;

// ── Mock collaborators ─────────────────────────────────────────────

/// Recognizer that replays a script, then stops the session.
#[derive(Default)]
struct MockRecognizer {
    script: Mutex<VecDeque<Result<String, CaptureError>>>,
    calls: Mutex<Vec<(CaptureOptions, bool)>>,
    queue: OnceLock<SpeechQueue>,
    stop: OnceLock<StopHandle>,
}

impl MockRecognizer {
    fn calls(&self) -> Vec<(CaptureOptions, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechRecognizer for MockRecognizer {
    async fn capture(&self, options: CaptureOptions) -> Result<String, CaptureError> {
        let idle = self.queue.get().is_some_and(SpeechQueue::is_idle);
        self.calls.lock().unwrap().push((options, idle));

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                if let Some(stop) = self.stop.get() {
                    stop.stop();
                }
                Err(CaptureError::Timeout)
            }
        }
    }
}

/// Chat service with scripted replies. Once `hang_after` requests have
/// been answered, it never answers again.
#[derive(Default)]
struct MockChat {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    hang_after: Option<usize>,
}

#[async_trait]
impl ChatCompletion for MockChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError> {
        let answered = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        if self.hang_after.is_some_and(|n| answered >= n) {
            std::future::pending::<()>().await;
        }
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok("Okay.".to_string()))
    }
}

/// Records every chunk it is asked to speak.
#[derive(Default)]
struct MockSynth {
    spoken: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl VoiceSynthesizer for MockSynth {
    async fn synthesize(
        &self,
        text: &str,
        speaker: &str,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_string(), speaker.to_string()));
        Ok(SynthesizedAudio::new(vec![0.0; 4], 16_000))
    }
}

/// Speaker whose clips take 200 ms.
struct MockOutput;

#[async_trait]
impl AudioOutput for MockOutput {
    async fn play(&self, _audio: SynthesizedAudio) -> Result<(), PlaybackError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(())
    }

    fn stop(&self) {}
}

struct MockPrompts {
    voices: Vec<String>,
}

impl VoicePromptStore for MockPrompts {
    fn lookup(&self, speaker: &str) -> Option<VoicePrompt> {
        self.voices.iter().any(|v| v == speaker).then(|| VoicePrompt {
            speaker: speaker.to_string(),
            path: format!("data/models/{speaker}_prompt.wav").into(),
            characteristics: None,
        })
    }

    fn list_voices(&self) -> Vec<String> {
        self.voices.clone()
    }

    fn setup_hint(&self, speaker: &str) -> String {
        format!("Record data/models/{speaker}_prompt.wav first.")
    }
}

// ── Harness ────────────────────────────────────────────────────────

struct Harness {
    orchestrator: Orchestrator,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    recognizer: Arc<MockRecognizer>,
    chat: Arc<MockChat>,
    synth: Arc<MockSynth>,
    queue: SpeechQueue,
}

impl Harness {
    fn spoken(&self) -> Vec<String> {
        self.synth
            .spoken
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    fn history(&self) -> Vec<(Role, String)> {
        self.orchestrator
            .history()
            .turns()
            .map(|t| (t.role, t.content.clone()))
            .collect()
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.chat.requests.lock().unwrap().clone()
    }

    fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(e) = self.events.try_recv() {
            events.push(e);
        }
        events
    }
}

struct Setup {
    script: Vec<Result<String, CaptureError>>,
    replies: Vec<Result<String, GenerationError>>,
    lines: Vec<&'static str>,
    voices: Vec<&'static str>,
    hang_after: Option<usize>,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            script: Vec::new(),
            replies: Vec::new(),
            lines: Vec::new(),
            voices: vec!["user"],
            hang_after: None,
        }
    }
}

fn heard(text: &str) -> Result<String, CaptureError> {
    Ok(text.to_string())
}

fn reply(text: &str) -> Result<String, GenerationError> {
    Ok(text.to_string())
}

fn harness(setup: Setup) -> Harness {
    let recognizer = Arc::new(MockRecognizer {
        script: Mutex::new(setup.script.into()),
        ..MockRecognizer::default()
    });
    let chat = Arc::new(MockChat {
        replies: Mutex::new(setup.replies.into()),
        hang_after: setup.hang_after,
        ..MockChat::default()
    });
    let synth = Arc::new(MockSynth::default());
    let queue = SpeechQueue::new(
        Arc::clone(&synth) as Arc<dyn VoiceSynthesizer>,
        Arc::new(MockOutput),
    );
    let prompts = Arc::new(MockPrompts {
        voices: setup.voices.into_iter().map(String::from).collect(),
    });

    let generator = ResponseGenerator::new(
        Arc::clone(&chat) as Arc<dyn ChatCompletion>,
        GeneratorConfig::default(),
    );
    let (orchestrator, events) = Orchestrator::new(
        Arc::clone(&recognizer) as Arc<dyn SpeechRecognizer>,
        generator,
        queue.clone(),
        prompts,
        OrchestratorConfig::default(),
    )
    .with_input(Box::new(ScriptedLines::new(setup.lines)))
    .with_events();

    let _ = recognizer.queue.set(queue.clone());
    let _ = recognizer.stop.set(orchestrator.stop_handle());

    Harness {
        orchestrator,
        events,
        recognizer,
        chat,
        synth,
        queue,
    }
}

fn config() -> OrchestratorConfig {
    OrchestratorConfig::default()
}

// ── Text mode ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn text_quit_ends_session_without_playback() {
    let mut h = harness(Setup {
        lines: vec!["QUIT"],
        ..Setup::default()
    });

    h.orchestrator.start(AgentMode::TextInteractive).await.unwrap();

    assert!(h.spoken().is_empty());
    assert!(h.history().is_empty());
    assert!(h.requests().is_empty());
    assert!(!h.orchestrator.is_running());
}

#[tokio::test(start_paused = true)]
async fn text_lines_become_turns_until_exit() {
    let mut h = harness(Setup {
        lines: vec!["hello", "   ", "how are you?", "exit", "never read"],
        replies: vec![reply("Hi!"), reply("Fine, thanks.")],
        ..Setup::default()
    });

    h.orchestrator.start(AgentMode::TextInteractive).await.unwrap();

    assert_eq!(
        h.history(),
        vec![
            (Role::User, "hello".to_string()),
            (Role::Assistant, "Hi!".to_string()),
            (Role::User, "how are you?".to_string()),
            (Role::Assistant, "Fine, thanks.".to_string()),
        ]
    );
    assert_eq!(h.spoken(), vec!["Hi!", "Fine, thanks."]);
    assert_eq!(h.requests().len(), 2);
    // Text mode never touches the microphone.
    assert!(h.recognizer.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn end_of_input_ends_text_session() {
    let mut h = harness(Setup {
        lines: vec!["only line"],
        ..Setup::default()
    });

    h.orchestrator.start(AgentMode::TextInteractive).await.unwrap();

    assert_eq!(h.history().len(), 2);
    assert_eq!(h.spoken(), vec!["Okay."]);
    let events = h.drain_events();
    assert_eq!(events.first(), Some(&SessionEvent::Started(AgentMode::TextInteractive)));
    assert_eq!(events.last(), Some(&SessionEvent::Ended(AgentMode::TextInteractive)));
}

#[tokio::test(start_paused = true)]
async fn generation_failure_speaks_apology_and_keeps_user_turn() {
    let mut h = harness(Setup {
        lines: vec!["hello"],
        replies: vec![Err(GenerationError::Network("connection refused".into()))],
        ..Setup::default()
    });

    h.orchestrator.start(AgentMode::TextInteractive).await.unwrap();

    let apology = config().apology;
    assert_eq!(h.spoken(), vec![apology.clone()]);
    assert_eq!(h.history(), vec![(Role::User, "hello".to_string())]);
    assert!(h.drain_events().contains(&SessionEvent::Reply {
        text: apology,
        fallback: true,
    }));
}

#[tokio::test(start_paused = true)]
async fn history_is_trimmed_and_context_is_bounded() {
    let mut h = harness(Setup {
        lines: vec!["q1", "q2", "q3", "q4", "q5", "q6", "q7"],
        ..Setup::default()
    });

    h.orchestrator.start(AgentMode::TextInteractive).await.unwrap();

    let history = h.history();
    assert_eq!(history.len(), 10);
    assert_eq!(history[0], (Role::User, "q3".to_string()));
    assert_eq!(history[9], (Role::Assistant, "Okay.".to_string()));

    let last = h.requests().pop().unwrap();
    assert_eq!(last.messages.len(), 9);
    assert_eq!(last.messages[0].role, Role::System);
    assert_eq!(last.messages[8].content, "q7");
}

// ── Voice mode ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn voice_goodbye_plays_farewell_and_ends() {
    let mut h = harness(Setup {
        script: vec![
            heard("tell me a joke"),
            Err(CaptureError::Timeout),
            Err(CaptureError::Unintelligible),
            heard("Well, goodbye!"),
        ],
        replies: vec![reply("Why did the chicken cross the road?")],
        ..Setup::default()
    });

    h.orchestrator.start(AgentMode::VoiceInteractive).await.unwrap();

    let config = config();
    assert_eq!(
        h.spoken(),
        vec![
            config.voice_greeting.clone(),
            "Why did the chicken cross the road?".to_string(),
            config.farewell.clone(),
        ]
    );
    assert_eq!(h.history().len(), 2);

    let calls = h.recognizer.calls();
    assert_eq!(calls.len(), 4);
    for (options, idle) in &calls {
        assert_eq!(*options, config.voice_capture);
        assert!(*idle, "capture started while playback was active");
    }
    assert!(!h.orchestrator.stop_handle().is_stopped());
}

#[tokio::test(start_paused = true)]
async fn voice_device_error_is_not_fatal() {
    let mut h = harness(Setup {
        script: vec![
            Err(CaptureError::Device("microphone unplugged".into())),
            heard("stop"),
        ],
        ..Setup::default()
    });

    h.orchestrator.start(AgentMode::VoiceInteractive).await.unwrap();

    let events = h.drain_events();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, SessionEvent::CaptureFailed(msg) if msg.contains("unplugged")))
    );
    assert!(h.history().is_empty());
    assert_eq!(h.spoken().last(), Some(&config().farewell));
}

#[tokio::test(start_paused = true)]
async fn missing_voice_profile_refuses_to_start() {
    for mode in [
        AgentMode::WakeWordLoop,
        AgentMode::TextInteractive,
        AgentMode::VoiceInteractive,
    ] {
        let mut h = harness(Setup {
            voices: vec!["someone-else"],
            lines: vec!["hello"],
            ..Setup::default()
        });

        let err = h.orchestrator.start(mode).await.unwrap_err();
        match err {
            SessionError::MissingVoiceProfile { speaker, setup_hint } => {
                assert_eq!(speaker, "user");
                assert!(setup_hint.contains("user_prompt.wav"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!h.orchestrator.is_running());
        assert!(h.recognizer.calls().is_empty());
        assert!(h.spoken().is_empty());
    }
}

// ── Wake-word mode ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn wake_phrase_starts_one_exchange() {
    let mut h = harness(Setup {
        script: vec![
            heard("hello there"),
            heard("Hey ASSISTANT"),
            heard("what's up"),
        ],
        replies: vec![reply("Not much.")],
        ..Setup::default()
    });

    h.orchestrator.start(AgentMode::WakeWordLoop).await.unwrap();

    let config = config();
    assert_eq!(
        h.spoken(),
        vec![config.wake_greeting.clone(), "Not much.".to_string()]
    );
    assert_eq!(
        h.history(),
        vec![
            (Role::User, "what's up".to_string()),
            (Role::Assistant, "Not much.".to_string()),
        ]
    );

    let options: Vec<CaptureOptions> = h.recognizer.calls().into_iter().map(|(o, _)| o).collect();
    assert_eq!(
        options,
        vec![
            config.wake_capture,
            config.wake_capture,
            config.conversation_capture,
            config.wake_capture,
        ]
    );
    assert!(h.drain_events().contains(&SessionEvent::WakeWordDetected));
}

// ── Turn processing and stop ───────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn process_turn_records_both_turns_and_speaks_reply() {
    let mut h = harness(Setup {
        replies: vec![reply("  Hello to you too.  ")],
        ..Setup::default()
    });

    let submitted = h.orchestrator.process_turn("hello").await;
    assert_eq!(submitted.as_deref(), Some("Hello to you too."));

    h.queue.wait_idle().await;
    assert_eq!(h.spoken(), vec!["Hello to you too."]);
    assert_eq!(
        h.history(),
        vec![
            (Role::User, "hello".to_string()),
            (Role::Assistant, "Hello to you too.".to_string()),
        ]
    );

    let request = &h.requests()[0];
    assert_eq!(request.messages.len(), 2);
    assert_eq!(request.messages[1].content, "hello");
    assert!(!request.stream);

    let synth_speaker = h.synth.spoken.lock().unwrap()[0].1.clone();
    assert_eq!(synth_speaker, "user");
}

#[tokio::test(start_paused = true)]
async fn stop_during_generation_rolls_back_user_turn() {
    let mut h = harness(Setup {
        hang_after: Some(0),
        ..Setup::default()
    });
    let handle = h.orchestrator.stop_handle();

    let (submitted, ()) = tokio::join!(h.orchestrator.process_turn("are you there?"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
    });

    assert_eq!(submitted, None);
    assert!(h.history().is_empty());
    assert!(h.spoken().is_empty());
    assert!(h.queue.is_idle());
}

#[tokio::test(start_paused = true)]
async fn stop_during_generation_restores_a_full_history() {
    let mut h = harness(Setup {
        hang_after: Some(5),
        ..Setup::default()
    });
    for i in 0..5 {
        let submitted = h.orchestrator.process_turn(&format!("q{i}")).await;
        assert_eq!(submitted.as_deref(), Some("Okay."));
    }
    let before = h.history();
    assert_eq!(before.len(), 10);

    let handle = h.orchestrator.stop_handle();
    let (submitted, ()) = tokio::join!(h.orchestrator.process_turn("never answered"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
    });

    assert_eq!(submitted, None);
    assert_eq!(h.history(), before);
    assert_eq!(h.history()[0], (Role::User, "q0".to_string()));
}

#[tokio::test(start_paused = true)]
async fn stop_before_start_ends_that_session_then_rearms() {
    let mut h = harness(Setup {
        lines: vec!["hello"],
        ..Setup::default()
    });
    let handle = h.orchestrator.stop_handle();

    h.orchestrator.stop();
    h.orchestrator.stop();
    handle.stop();
    assert!(!h.orchestrator.is_running());
    assert!(h.queue.is_idle());

    // The pending stop ends the session before any input is read.
    h.orchestrator.start(AgentMode::TextInteractive).await.unwrap();
    assert!(h.history().is_empty());
    assert!(h.requests().is_empty());
    assert_eq!(
        h.drain_events(),
        vec![
            SessionEvent::Started(AgentMode::TextInteractive),
            SessionEvent::Ended(AgentMode::TextInteractive),
        ]
    );
    assert!(!handle.is_stopped());

    h.orchestrator.start(AgentMode::TextInteractive).await.unwrap();
    assert_eq!(h.history().len(), 2);
    assert_eq!(h.spoken(), vec!["Okay."]);
}

#[tokio::test(start_paused = true)]
async fn stop_before_voice_session_skips_greeting_and_capture() {
    let mut h = harness(Setup {
        script: vec![heard("hello")],
        ..Setup::default()
    });

    h.orchestrator.stop_handle().stop();
    h.orchestrator.start(AgentMode::VoiceInteractive).await.unwrap();

    assert!(h.spoken().is_empty());
    assert!(h.recognizer.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_handle_ends_a_running_voice_session() {
    // Empty script: the first capture stops the session through the handle.
    let mut h = harness(Setup::default());

    h.orchestrator.start(AgentMode::VoiceInteractive).await.unwrap();

    assert!(!h.orchestrator.is_running());
    assert!(h.history().is_empty());
    assert!(h.queue.is_idle());

    // The handle is re-armed, so direct turns work again.
    assert!(!h.orchestrator.stop_handle().is_stopped());
    let submitted = h.orchestrator.process_turn("still there?").await;
    assert_eq!(submitted.as_deref(), Some("Okay."));
    assert_eq!(h.history().len(), 2);
}
