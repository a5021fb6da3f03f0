//! Bridges one Twilio media stream to one OpenAI Realtime session.

pub mod bridge;
pub mod session;

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use supplydrop_realtime::types::audio::{AudioFormat, ServerVadTurnDetection, TurnDetection, Voice};
use supplydrop_realtime::types::Session;
use supplydrop_realtime::{Client, ConfigBuilder};

use crate::config::Config;

pub use bridge::run;
pub use session::{Action, CallSession};

/// Session settings sent to the realtime API as soon as a call connects.
///
/// Twilio speaks G.711 µ-law in both directions, so the model is asked for
/// the same format and no transcoding is needed.
pub fn session_config(instructions: &str, voice: Voice) -> Session {
    Session::builder()
        .with_modalities_enable_audio()
        .with_instructions(instructions)
        .with_voice(voice)
        .with_input_audio_format(AudioFormat::Mulaw)
        .with_output_audio_format(AudioFormat::Mulaw)
        .with_turn_detection_enable(TurnDetection::ServerVad(ServerVadTurnDetection::default()))
        .with_temperature(0.8)
        .build()
}

pub async fn connect_realtime(config: &Config) -> Result<Client> {
    let realtime_config = ConfigBuilder::new()
        .with_base_url(&config.realtime_url)
        .with_model(&config.realtime_model)
        .with_api_key(SecretString::from(
            config.openai_api_key.expose_secret().to_owned(),
        ))
        .build();
    supplydrop_realtime::connect_with_config(1024, realtime_config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_uses_mulaw_and_server_vad() {
        let session = session_config("You help callers.", Voice::Shimmer);
        assert_eq!(session.instructions(), Some("You help callers."));
        assert_eq!(session.voice(), Some(&Voice::Shimmer));
        assert_eq!(session.input_audio_format(), Some(&AudioFormat::Mulaw));
        assert_eq!(session.output_audio_format(), Some(&AudioFormat::Mulaw));
        assert!(matches!(
            session.turn_detection(),
            Some(TurnDetection::ServerVad(_))
        ));
        assert!(session.modalities().iter().any(|m| m == "audio"));
        assert!((session.temperature() - 0.8).abs() < f32::EPSILON);

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["input_audio_format"], "g711_ulaw");
        assert_eq!(json["output_audio_format"], "g711_ulaw");
        assert_eq!(json["turn_detection"]["type"], "server_vad");
    }
}
