use std::path::PathBuf;

use supplydrop_realtime::Stats;
use supplydrop_types::events::client::{InputAudioBufferAppendEvent, ResponseCancelEvent};
use supplydrop_types::twilio::{TwilioInbound, TwilioOutbound};
use supplydrop_types::{ClientEvent, ServerEvent};
use supplydrop_utils::audio;

use crate::call_log::CallLog;
use crate::error::RelayError;

/// Realtime event types recorded in the call log as they arrive.
pub const LOG_EVENT_TYPES: &[&str] = &[
    "response.content.done",
    "rate_limits.updated",
    "response.done",
    "input_audio_buffer.committed",
    "input_audio_buffer.speech_stopped",
    "input_audio_buffer.speech_started",
    "session.created",
    "turn.start",
    "turn.end",
];

#[derive(Debug, Clone)]
pub enum Action {
    ToRealtime(ClientEvent),
    ToTwilio(TwilioOutbound),
    Finish,
}

/// State of one phone call: which stream it is, which turn and response are
/// live, and the call's log file once Twilio has announced the stream.
///
/// Assistant audio counts as playing from the first frame sent until Twilio
/// echoes back the mark sent after that response's audio. `response.done`
/// usually arrives while Twilio still has seconds of audio queued.
pub struct CallSession {
    logs_dir: PathBuf,
    barge_in: bool,
    stream_sid: Option<String>,
    log: Option<CallLog>,
    current_turn: Option<String>,
    active_response: Option<String>,
    unmarked_audio: bool,
    pending_marks: Vec<String>,
    frames_in: u64,
    frames_out: u64,
    audio_out_ms: u64,
}

impl CallSession {
    pub fn new(logs_dir: PathBuf, barge_in: bool) -> Self {
        Self {
            logs_dir,
            barge_in,
            stream_sid: None,
            log: None,
            current_turn: None,
            active_response: None,
            unmarked_audio: false,
            pending_marks: Vec::new(),
            frames_in: 0,
            frames_out: 0,
            audio_out_ms: 0,
        }
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    pub fn current_turn(&self) -> Option<&str> {
        self.current_turn.as_deref()
    }

    /// Whether Twilio may still be playing assistant audio to the caller.
    pub fn is_playing(&self) -> bool {
        self.unmarked_audio || !self.pending_marks.is_empty()
    }

    pub fn log_path(&self) -> Option<&std::path::Path> {
        self.log.as_ref().map(|log| log.path())
    }

    pub async fn info(&mut self, message: &str) {
        match self.log.as_mut() {
            Some(log) => log.info(message).await,
            None => tracing::debug!("{}", message),
        }
    }

    pub async fn warn(&mut self, message: &str) {
        match self.log.as_mut() {
            Some(log) => log.warn(message).await,
            None => tracing::warn!("{}", message),
        }
    }

    pub async fn error(&mut self, message: &str) {
        match self.log.as_mut() {
            Some(log) => log.error(message).await,
            None => tracing::error!("{}", message),
        }
    }

    pub async fn on_twilio_message(
        &mut self,
        message: TwilioInbound,
    ) -> Result<Vec<Action>, RelayError> {
        match message {
            TwilioInbound::Connected { protocol, version } => {
                tracing::info!(?protocol, ?version, "Twilio media stream connected");
                Ok(vec![])
            }
            TwilioInbound::Start { ref start, .. } => {
                if let Some(existing) = &self.stream_sid {
                    tracing::warn!(
                        stream_sid = %existing,
                        ignored = %start.stream_sid,
                        "ignoring repeated start message"
                    );
                    return Ok(vec![]);
                }
                let stream_sid = start.stream_sid.clone();
                let payload = serde_json::to_string(&message)?;
                self.log = Some(CallLog::create(&self.logs_dir, &stream_sid).await?);
                self.stream_sid = Some(stream_sid.clone());
                self.info(&format!("Call started - Stream SID: {}", stream_sid))
                    .await;
                self.info(&format!("Start event payload: {}", payload)).await;
                Ok(vec![])
            }
            TwilioInbound::Media { media, .. } => {
                self.frames_in += 1;
                self.info("Received audio data from Twilio").await;
                Ok(vec![Action::ToRealtime(ClientEvent::InputAudioBufferAppend(
                    InputAudioBufferAppendEvent::new(media.payload),
                ))])
            }
            TwilioInbound::Mark { mark, .. } => {
                self.pending_marks.retain(|pending| *pending != mark.name);
                self.info(&format!("Mark received: {}", mark.name)).await;
                Ok(vec![])
            }
            TwilioInbound::Dtmf { dtmf, .. } => {
                self.info(&format!("DTMF digit received: {}", dtmf.digit))
                    .await;
                Ok(vec![])
            }
            TwilioInbound::Stop { .. } => {
                self.info("Call ended").await;
                Ok(vec![Action::Finish])
            }
        }
    }

    pub async fn on_realtime_event(&mut self, event: &ServerEvent) -> Vec<Action> {
        if LOG_EVENT_TYPES.contains(&event.event_type()) {
            self.info(&format!("OpenAI event: {}", event.event_type()))
                .await;
        }

        let mut actions = Vec::new();
        match event {
            ServerEvent::TurnStart(turn) => {
                let new_turn = turn.turn_id().map(str::to_string);
                if let Some(previous) = self.current_turn.take() {
                    if new_turn.as_deref() != Some(previous.as_str()) {
                        actions.push(Action::ToRealtime(ClientEvent::ResponseCancel(
                            ResponseCancelEvent::new(),
                        )));
                        self.info(&format!("Cancelled response for turn {}", previous))
                            .await;
                    }
                }
                self.current_turn = new_turn;
                let label = self.current_turn.clone().unwrap_or_else(|| "unknown".to_string());
                self.info(&format!("New turn started: {}", label)).await;
            }
            ServerEvent::TurnEnd(turn) => {
                self.info(&format!("Turn ended: {}", turn.turn_id().unwrap_or("unknown")))
                    .await;
            }
            ServerEvent::ResponseCreated(created) => {
                self.active_response = Some(created.response().id().to_string());
            }
            ServerEvent::ResponseDone(done) => {
                let response_id = done.response().id();
                if self.active_response.as_deref() == Some(response_id) {
                    self.active_response = None;
                }
                if self.unmarked_audio {
                    if let Some(stream_sid) = &self.stream_sid {
                        actions.push(Action::ToTwilio(TwilioOutbound::mark(stream_sid, response_id)));
                        self.pending_marks.push(response_id.to_string());
                    }
                    self.unmarked_audio = false;
                }
            }
            ServerEvent::InputAudioBufferSpeechStarted(_) => {
                if self.barge_in && self.is_playing() {
                    if let Some(stream_sid) = self.stream_sid.clone() {
                        actions.push(Action::ToTwilio(TwilioOutbound::clear(&stream_sid)));
                        // A finished response only needs its queued audio dropped.
                        if let Some(response_id) = &self.active_response {
                            actions.push(Action::ToRealtime(ClientEvent::ResponseCancel(
                                ResponseCancelEvent::new().with_response_id(response_id),
                            )));
                        }
                        let label = self
                            .active_response
                            .clone()
                            .or_else(|| self.pending_marks.last().cloned())
                            .unwrap_or_else(|| "unknown".to_string());
                        self.info(&format!("Caller interrupted response {}", label))
                            .await;
                    }
                    // Twilio echoes cleared marks back; they no longer match anything.
                    self.pending_marks.clear();
                    self.unmarked_audio = false;
                }
            }
            ServerEvent::ResponseAudioDelta(delta) if !delta.delta().is_empty() => {
                let Some(stream_sid) = self.stream_sid.clone() else {
                    tracing::debug!("dropping assistant audio received before stream start");
                    return actions;
                };
                match audio::reencode(delta.delta()) {
                    Ok(payload) => {
                        self.audio_out_ms += audio::payload_duration_ms(&payload);
                        actions.push(Action::ToTwilio(TwilioOutbound::media(&stream_sid, payload)));
                        self.frames_out += 1;
                        self.unmarked_audio = true;
                        self.info("Sent audio response to Twilio").await;
                    }
                    Err(e) => {
                        self.error(&format!("Error processing audio data: {}", e))
                            .await;
                    }
                }
            }
            ServerEvent::Error(error) => {
                self.error(&format!("OpenAI error: {}", error.error().message()))
                    .await;
            }
            ServerEvent::Close { reason } => {
                self.info(&format!(
                    "OpenAI connection closed: {}",
                    reason.as_deref().unwrap_or("no reason given")
                ))
                .await;
                actions.push(Action::Finish);
            }
            _ => {}
        }
        actions
    }

    /// Writes the call summary and closes the log. Returns the log's path if
    /// the call ever started.
    pub async fn finish(mut self, stats: Option<Stats>) -> Result<Option<PathBuf>, RelayError> {
        let summary = format!(
            "Call summary: {} audio frames from caller, {} to caller ({} ms)",
            self.frames_in, self.frames_out, self.audio_out_ms
        );
        self.info(&summary).await;
        if let Some(stats) = stats {
            self.info(&format!(
                "Token usage: {} total, {} input, {} output over {} responses",
                stats.total_tokens(),
                stats.input_tokens(),
                stats.output_tokens(),
                stats.responses()
            ))
            .await;
        }
        match self.log.take() {
            Some(log) => Ok(Some(log.close().await?)),
            None => Ok(None),
        }
    }
}
