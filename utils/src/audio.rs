use base64::Engine;

/// Twilio media streams carry 8kHz mono G.711 µ-law, one byte per sample.
pub const MULAW_SAMPLE_RATE: u32 = 8000;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("invalid base64 audio payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("empty audio payload")]
    Empty,
}

pub fn decode(fragment: &str) -> Result<Vec<u8>, AudioError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(fragment)?;
    if bytes.is_empty() {
        return Err(AudioError::Empty);
    }
    Ok(bytes)
}

pub fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decodes and re-encodes a payload so that only well-formed, canonically
/// padded base64 is forwarded to the other leg of the call.
pub fn reencode(fragment: &str) -> Result<String, AudioError> {
    decode(fragment).map(|bytes| encode(&bytes))
}

/// Playback length of a µ-law buffer in milliseconds.
pub fn mulaw_duration_ms(byte_len: usize) -> u64 {
    (byte_len as u64 * 1000) / MULAW_SAMPLE_RATE as u64
}

/// Playback length of a base64 µ-law payload, computed without decoding it.
pub fn payload_duration_ms(fragment: &str) -> u64 {
    let padding = fragment.bytes().rev().take_while(|&b| b == b'=').count();
    let byte_len = (fragment.len() / 4 * 3).saturating_sub(padding);
    mulaw_duration_ms(byte_len)
}
