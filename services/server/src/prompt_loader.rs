use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const FALLBACK_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

pub const DEFAULT_GREETING_VOICE: &str = "Polly.Matthew";
pub const DEFAULT_WELCOME: &str = "Hello. Welcome to the Supply Drop Resource Assistance Line. \
I can help you find Wildfire relief resources in Southern California and Hurricane Recovery \
Resources in Western North Carolina. How can I help?";
pub const DEFAULT_FOLLOW_UP: &str = "How can I help?";

/// What the caller hears from Twilio before the media stream opens.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Greeting {
    pub voice: String,
    pub welcome: String,
    pub follow_up: String,
}

impl Default for Greeting {
    fn default() -> Self {
        Self {
            voice: DEFAULT_GREETING_VOICE.to_string(),
            welcome: DEFAULT_WELCOME.to_string(),
            follow_up: DEFAULT_FOLLOW_UP.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prompts {
    pub system_message: String,
    pub greeting: Greeting,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            system_message: FALLBACK_SYSTEM_PROMPT.to_string(),
            greeting: Greeting::default(),
        }
    }
}

#[derive(Deserialize)]
struct PromptsFile {
    system_message: SystemMessage,
    #[serde(default)]
    greeting: Option<Greeting>,
}

#[derive(Deserialize)]
struct SystemMessage {
    content: String,
}

pub fn read_prompts(path: &Path) -> Result<Prompts> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompts file: {}", path.display()))?;
    let file: PromptsFile = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse prompts file: {}", path.display()))?;

    Ok(Prompts {
        system_message: file.system_message.content,
        greeting: file.greeting.unwrap_or_default(),
    })
}

/// Like [`read_prompts`], but a missing or malformed file falls back to the
/// generic assistant prompt and the default greeting.
pub fn load_prompts(path: &Path) -> Prompts {
    match read_prompts(path) {
        Ok(prompts) => prompts,
        Err(e) => {
            tracing::error!("Error loading system prompt: {:#}", e);
            Prompts::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_system_message() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("prompts.json");
        let mut file = File::create(&path)?;
        writeln!(
            file,
            r#"{{"system_message": {{"content": "You help callers find shelters."}}}}"#
        )?;

        let prompts = read_prompts(&path)?;

        assert_eq!(prompts.system_message, "You help callers find shelters.");
        assert_eq!(prompts.greeting, Greeting::default());
        Ok(())
    }

    #[test]
    fn test_partial_greeting_keeps_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("prompts.json");
        fs::write(
            &path,
            r#"{"system_message": {"content": "x"}, "greeting": {"follow_up": "What do you need?"}}"#,
        )?;

        let prompts = read_prompts(&path)?;

        assert_eq!(prompts.greeting.follow_up, "What do you need?");
        assert_eq!(prompts.greeting.voice, DEFAULT_GREETING_VOICE);
        assert_eq!(prompts.greeting.welcome, DEFAULT_WELCOME);
        Ok(())
    }

    #[test]
    fn test_missing_file_falls_back() {
        let prompts = load_prompts(Path::new("nonexistent_dir_for_testing/prompts.json"));
        assert_eq!(prompts.system_message, FALLBACK_SYSTEM_PROMPT);
    }

    #[test]
    fn test_missing_key_falls_back() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("prompts.json");
        fs::write(&path, r#"{"system_prompt": "wrong key"}"#)?;

        assert!(read_prompts(&path).is_err());
        assert_eq!(load_prompts(&path), Prompts::default());
        Ok(())
    }
}
