mod turn_detection;
mod consts;

pub use turn_detection::{TurnDetection, ServerVadTurnDetection};
pub use consts::*;
/// Audio data encoded as base64
pub type Base64EncodedAudioBytes = String;
