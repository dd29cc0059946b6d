//! Filesystem voice-prompt store.
//!
//! Layout under the models directory:
//!
//! ```text
//! <models_dir>/<speaker>_prompt.wav            reference audio (required)
//! <models_dir>/<speaker>_characteristics.json  voice metadata (optional)
//! ```

use std::path::{Path, PathBuf};

use voxagent_core::{VoicePrompt, VoicePromptStore};

const PROMPT_SUFFIX: &str = "_prompt.wav";
const CHARACTERISTICS_SUFFIX: &str = "_characteristics.json";

/// Voice prompts stored as files in a single directory.
#[derive(Debug, Clone)]
pub struct FsVoicePromptStore {
    models_dir: PathBuf,
}

impl FsVoicePromptStore {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    #[must_use]
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Path where `speaker`'s reference audio is expected.
    #[must_use]
    pub fn prompt_path(&self, speaker: &str) -> PathBuf {
        self.models_dir.join(format!("{speaker}{PROMPT_SUFFIX}"))
    }

    fn characteristics_path(&self, speaker: &str) -> PathBuf {
        self.models_dir
            .join(format!("{speaker}{CHARACTERISTICS_SUFFIX}"))
    }

    fn read_characteristics(&self, speaker: &str) -> Option<serde_json::Value> {
        let path = self.characteristics_path(speaker);
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable voice characteristics");
                None
            }
        }
    }
}

/// Speaker names are used as file-name stems, so path separators and
/// parent references are rejected outright.
fn is_valid_speaker(speaker: &str) -> bool {
    !speaker.is_empty()
        && speaker != "."
        && speaker != ".."
        && !speaker.contains(['/', '\\'])
}

impl VoicePromptStore for FsVoicePromptStore {
    fn lookup(&self, speaker: &str) -> Option<VoicePrompt> {
        if !is_valid_speaker(speaker) {
            return None;
        }
        let path = self.prompt_path(speaker);
        if !path.is_file() {
            return None;
        }
        Some(VoicePrompt {
            speaker: speaker.to_string(),
            characteristics: self.read_characteristics(speaker),
            path,
        })
    }

    fn list_voices(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.models_dir) else {
            tracing::debug!(dir = %self.models_dir.display(), "Voice prompt directory not readable");
            return Vec::new();
        };

        let mut voices: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                name.strip_suffix(PROMPT_SUFFIX)
                    .filter(|speaker| is_valid_speaker(speaker))
                    .map(str::to_string)
            })
            .collect();
        voices.sort();
        voices
    }

    fn setup_hint(&self, speaker: &str) -> String {
        format!(
            "Record a reference clip of '{speaker}' and save it as {} before starting a session.",
            self.prompt_path(speaker).display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_prompt_and_characteristics() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alice_prompt.wav"), b"RIFF").unwrap();
        std::fs::write(
            dir.path().join("alice_characteristics.json"),
            r#"{"pitch_mean": 180.5}"#,
        )
        .unwrap();

        let store = FsVoicePromptStore::new(dir.path());
        let prompt = store.lookup("alice").unwrap();
        assert_eq!(prompt.speaker, "alice");
        assert_eq!(prompt.path, dir.path().join("alice_prompt.wav"));
        assert_eq!(prompt.characteristics.unwrap()["pitch_mean"], 180.5);
    }

    #[test]
    fn lookup_without_characteristics() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bob_prompt.wav"), b"RIFF").unwrap();
        std::fs::write(dir.path().join("bob_characteristics.json"), "not json").unwrap();

        let prompt = FsVoicePromptStore::new(dir.path()).lookup("bob").unwrap();
        assert!(prompt.characteristics.is_none());
    }

    #[test]
    fn missing_prompt_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsVoicePromptStore::new(dir.path());
        assert!(store.lookup("carol").is_none());
        assert!(store.lookup("../carol").is_none());
    }

    #[test]
    fn list_voices_is_sorted_and_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zed_prompt.wav", "amy_prompt.wav", "amy_characteristics.json", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("dir_prompt.wav")).unwrap();

        let store = FsVoicePromptStore::new(dir.path());
        assert_eq!(store.list_voices(), vec!["amy", "zed"]);
    }

    #[test]
    fn list_voices_on_missing_dir_is_empty() {
        let store = FsVoicePromptStore::new("/nonexistent/voxagent/models");
        assert!(store.list_voices().is_empty());
    }

    #[test]
    fn setup_hint_names_expected_file() {
        let store = FsVoicePromptStore::new("data/models");
        let hint = store.setup_hint("dave");
        assert!(hint.contains("dave_prompt.wav"));
    }
}
