use crate::audio::{AudioFormat, TurnDetection, Voice};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Session {
    /// The set of modalities the model can respond with. To disable audio, set this to ["text"].
    /// To enable audio, set this to ["text", "audio"].
    modalities: Vec<String>,

    /// The default system instructions prepended to model calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,

    /// The voice the model uses to respond. Cannot be changed once the model has responded with audio at least once.
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<Voice>,

    /// The format of input audio. Options are "pcm16", "g711_ulaw", "g711_alaw".
    #[serde(skip_serializing_if = "Option::is_none")]
    input_audio_format: Option<AudioFormat>,

    /// The format of output audio. Options are "pcm16", "g711_ulaw", "g711_alaw".
    #[serde(skip_serializing_if = "Option::is_none")]
    output_audio_format: Option<AudioFormat>,

    /// Configuration for turn detection. Can be set to null to turn off
    turn_detection: Option<TurnDetection>,

    /// Sampling temperature for the model.
    temperature: f32,

    /// Maximum number of output tokens. Use "inf" for infinity.
    #[serde(skip_serializing_if = "Option::is_none")]
    max_response_output_tokens: Option<MaxOutputTokens>,
}

impl Session {
    pub fn builder() -> SessionConfigurator {
        SessionConfigurator::new()
    }

    pub fn modalities(&self) -> &[String] {
        &self.modalities
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    pub fn input_audio_format(&self) -> Option<&AudioFormat> {
        self.input_audio_format.as_ref()
    }

    pub fn output_audio_format(&self) -> Option<&AudioFormat> {
        self.output_audio_format.as_ref()
    }

    pub fn turn_detection(&self) -> Option<&TurnDetection> {
        self.turn_detection.as_ref()
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum MaxOutputTokens {
    Number(i32),
    Infinity(String),
}

pub struct SessionConfigurator {
    session: Session,
}

impl Default for SessionConfigurator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfigurator {
    pub fn new() -> Self {
        Self {
            session: Session {
                modalities: vec!["text".to_string(), "audio".to_string()],
                instructions: None,
                voice: None,
                input_audio_format: None,
                output_audio_format: None,
                turn_detection: None,
                temperature: 0.8,
                max_response_output_tokens: None,
            },
        }
    }

    pub fn with_modalities(mut self, modalities: Vec<String>) -> Self {
        self.session.modalities = modalities;
        self
    }

    pub fn with_modalities_disable_audio(mut self) -> Self {
        self.session.modalities = vec!["text".to_string()];
        self
    }

    pub fn with_modalities_enable_audio(mut self) -> Self {
        self.session.modalities = vec!["text".to_string(), "audio".to_string()];
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.session.instructions = Some(instructions.to_string());
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.session.voice = Some(voice);
        self
    }

    pub fn with_input_audio_format(mut self, format: AudioFormat) -> Self {
        self.session.input_audio_format = Some(format);
        self
    }

    pub fn with_output_audio_format(mut self, format: AudioFormat) -> Self {
        self.session.output_audio_format = Some(format);
        self
    }

    pub fn with_turn_detection_enable(mut self, turn_detection: TurnDetection) -> Self {
        self.session.turn_detection = Some(turn_detection);
        self
    }

    pub fn with_turn_detection_disable(mut self) -> Self {
        self.session.turn_detection = None;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.session.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: MaxOutputTokens) -> Self {
        self.session.max_response_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn build(self) -> Session {
        self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ServerVadTurnDetection;

    #[test]
    fn telephony_session_serializes_ulaw_both_ways() {
        let session = Session::builder()
            .with_instructions("Help callers find shelters.")
            .with_voice(Voice::Shimmer)
            .with_input_audio_format(AudioFormat::Mulaw)
            .with_output_audio_format(AudioFormat::Mulaw)
            .with_turn_detection_enable(TurnDetection::ServerVad(
                ServerVadTurnDetection::default(),
            ))
            .build();

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["modalities"], serde_json::json!(["text", "audio"]));
        assert_eq!(json["input_audio_format"], "g711_ulaw");
        assert_eq!(json["output_audio_format"], "g711_ulaw");
        assert_eq!(json["voice"], "shimmer");
        assert_eq!(json["instructions"], "Help callers find shelters.");
        assert_eq!(json["turn_detection"]["type"], "server_vad");
        assert!((json["temperature"].as_f64().unwrap() - 0.8).abs() < 1e-6);
        assert!(json.get("max_response_output_tokens").is_none());
    }

    #[test]
    fn disabled_turn_detection_is_sent_as_null() {
        let session = Session::builder()
            .with_modalities_disable_audio()
            .with_turn_detection_disable()
            .build();
        let json = serde_json::to_value(&session).unwrap();
        assert!(json["turn_detection"].is_null());
        assert_eq!(session.modalities(), ["text".to_string()]);
    }
}
