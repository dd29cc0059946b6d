//! Conversation side of voxagent.
//!
//! [`ChatCompletionsClient`] talks to the language model,
//! [`ResponseGenerator`] builds each request from the bounded history, and
//! [`Orchestrator`] runs the session loops on top of the voice adapters.

pub mod generator;
pub mod input;
pub mod llm;
pub mod orchestrator;

pub use generator::{GeneratorConfig, ResponseGenerator};
pub use input::{LineSource, ScriptedLines, StdinLines};
pub use llm::{ChatCompletionsClient, LlmClientConfig};
pub use orchestrator::{Orchestrator, OrchestratorConfig, SessionEvent, StopHandle};
