//! Twilio Media Streams messages.
//!
//! Twilio sends JSON text frames tagged by `event` over the media-stream
//! WebSocket. Audio payloads are base64 G.711 µ-law at 8kHz mono.

pub mod twiml;

use std::collections::HashMap;

use crate::audio::Base64EncodedAudioBytes;

/// Messages Twilio sends to the media-stream endpoint.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TwilioInbound {
    Connected {
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        version: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Start {
        #[serde(default)]
        sequence_number: Option<String>,
        start: StreamStart,
        #[serde(default)]
        stream_sid: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Media {
        #[serde(default)]
        sequence_number: Option<String>,
        media: MediaChunk,
        #[serde(default)]
        stream_sid: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Mark {
        #[serde(default)]
        sequence_number: Option<String>,
        mark: MarkLabel,
        #[serde(default)]
        stream_sid: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Dtmf {
        #[serde(default)]
        sequence_number: Option<String>,
        dtmf: DtmfDigit,
        #[serde(default)]
        stream_sid: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Stop {
        #[serde(default)]
        sequence_number: Option<String>,
        #[serde(default)]
        stop: Option<StreamStop>,
        #[serde(default)]
        stream_sid: Option<String>,
    },
}

impl TwilioInbound {
    pub fn event_name(&self) -> &'static str {
        match self {
            TwilioInbound::Connected { .. } => "connected",
            TwilioInbound::Start { .. } => "start",
            TwilioInbound::Media { .. } => "media",
            TwilioInbound::Mark { .. } => "mark",
            TwilioInbound::Dtmf { .. } => "dtmf",
            TwilioInbound::Stop { .. } => "stop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    pub stream_sid: String,
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub tracks: Vec<String>,
    #[serde(default)]
    pub custom_parameters: HashMap<String, String>,
    #[serde(default)]
    pub media_format: Option<MediaFormat>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaChunk {
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub chunk: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub payload: Base64EncodedAudioBytes,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarkLabel {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DtmfDigit {
    #[serde(default)]
    pub track: Option<String>,
    pub digit: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStop {
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub call_sid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OutboundMedia {
    pub payload: Base64EncodedAudioBytes,
}

/// Messages sent back to Twilio on the media-stream socket.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TwilioOutbound {
    #[serde(rename_all = "camelCase")]
    Media {
        stream_sid: String,
        media: OutboundMedia,
    },
    #[serde(rename_all = "camelCase")]
    Mark { stream_sid: String, mark: MarkLabel },
    /// Drops any audio Twilio has buffered but not yet played.
    #[serde(rename_all = "camelCase")]
    Clear { stream_sid: String },
}

impl TwilioOutbound {
    pub fn media(stream_sid: &str, payload: Base64EncodedAudioBytes) -> Self {
        TwilioOutbound::Media {
            stream_sid: stream_sid.to_string(),
            media: OutboundMedia { payload },
        }
    }

    pub fn mark(stream_sid: &str, name: &str) -> Self {
        TwilioOutbound::Mark {
            stream_sid: stream_sid.to_string(),
            mark: MarkLabel {
                name: name.to_string(),
            },
        }
    }

    pub fn clear(stream_sid: &str) -> Self {
        TwilioOutbound::Clear {
            stream_sid: stream_sid.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_message() {
        let text = r#"{
            "event": "start",
            "sequenceNumber": "1",
            "start": {
                "accountSid": "AC123",
                "streamSid": "MZ18ad3ab5a668481ce02b83e7395059f0",
                "callSid": "CA123",
                "tracks": ["inbound"],
                "customParameters": {},
                "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1}
            },
            "streamSid": "MZ18ad3ab5a668481ce02b83e7395059f0"
        }"#;
        let message: TwilioInbound = serde_json::from_str(text).unwrap();
        match message {
            TwilioInbound::Start { start, .. } => {
                assert_eq!(start.stream_sid, "MZ18ad3ab5a668481ce02b83e7395059f0");
                assert_eq!(start.call_sid.as_deref(), Some("CA123"));
                let format = start.media_format.unwrap();
                assert_eq!(format.encoding, "audio/x-mulaw");
                assert_eq!(format.sample_rate, 8000);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn parses_media_and_stop() {
        let media: TwilioInbound = serde_json::from_str(
            r#"{"event":"media","sequenceNumber":"3","media":{"track":"inbound","chunk":"1","timestamp":"5","payload":"/////w=="},"streamSid":"MZ1"}"#,
        )
        .unwrap();
        assert_eq!(media.event_name(), "media");
        match media {
            TwilioInbound::Media { media, .. } => assert_eq!(media.payload, "/////w=="),
            other => panic!("unexpected message: {:?}", other),
        }

        let stop: TwilioInbound = serde_json::from_str(
            r#"{"event":"stop","sequenceNumber":"5","streamSid":"MZ1","stop":{"accountSid":"AC1","callSid":"CA1"}}"#,
        )
        .unwrap();
        assert_eq!(stop.event_name(), "stop");
    }

    #[test]
    fn outbound_media_uses_twilio_field_names() {
        let message = TwilioOutbound::media("MZ1", "AAAA".to_string());
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "media", "streamSid": "MZ1", "media": {"payload": "AAAA"}})
        );

        let json = serde_json::to_value(TwilioOutbound::clear("MZ1")).unwrap();
        assert_eq!(json, serde_json::json!({"event": "clear", "streamSid": "MZ1"}));
    }
}
