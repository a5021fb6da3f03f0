/// Failures that end a call relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("realtime connection error: {0:#}")]
    Realtime(#[from] anyhow::Error),
    #[error("call log error: {0}")]
    CallLog(#[from] std::io::Error),
    #[error("failed to send to Twilio: {0}")]
    TwilioSend(String),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
