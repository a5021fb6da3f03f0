use std::fmt::Display;
use std::path::PathBuf;

use futures::{Sink, SinkExt, Stream, StreamExt};
use supplydrop_realtime::types::twilio::TwilioInbound;
use supplydrop_realtime::types::Session;
use supplydrop_realtime::{RealtimeClient, ServerRx};
use tokio::sync::broadcast::error::RecvError;

use crate::error::RelayError;
use crate::relay::session::{Action, CallSession};

/// Relays one call until either side hangs up.
///
/// `inbound` yields the text frames Twilio sends and `outbound` accepts the
/// text frames sent back to it. The realtime client is configured with
/// `session` first and closed on the way out, whatever ended the call.
/// Returns the path of the call's log file if the call got far enough to
/// open one.
pub async fn run<C, I, O>(
    mut client: C,
    session: Session,
    mut call: CallSession,
    mut inbound: I,
    mut outbound: O,
) -> Result<Option<PathBuf>, RelayError>
where
    C: RealtimeClient,
    I: Stream<Item = String> + Unpin,
    O: Sink<String> + Unpin,
    O::Error: Display,
{
    let result = match start(&mut client, session).await {
        Ok(mut events) => {
            relay(&mut client, &mut call, &mut inbound, &mut outbound, &mut events).await
        }
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        call.error(&format!("Relay error: {}", e)).await;
    }

    if let Err(e) = client.close().await {
        tracing::warn!("failed to close realtime connection: {:#}", e);
    }
    let stats = match client.stats() {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::warn!("failed to read realtime stats: {:#}", e);
            None
        }
    };
    let log_path = call.finish(stats).await?;
    result.map(|_| log_path)
}

async fn start<C: RealtimeClient>(client: &mut C, session: Session) -> Result<ServerRx, RelayError> {
    client.update_session(session).await?;
    Ok(client.server_events().await?)
}

async fn relay<C, I, O>(
    client: &mut C,
    call: &mut CallSession,
    inbound: &mut I,
    outbound: &mut O,
    events: &mut ServerRx,
) -> Result<(), RelayError>
where
    C: RealtimeClient,
    I: Stream<Item = String> + Unpin,
    O: Sink<String> + Unpin,
    O::Error: Display,
{
    loop {
        let actions = tokio::select! {
            message = inbound.next() => match message {
                Some(text) => match serde_json::from_str::<TwilioInbound>(&text) {
                    Ok(message) => call.on_twilio_message(message).await?,
                    Err(e) => {
                        tracing::warn!("ignoring unparseable Twilio message: {}", e);
                        continue;
                    }
                },
                None => {
                    call.info("Client disconnected").await;
                    return Ok(());
                }
            },
            event = events.recv() => match event {
                Ok(event) => call.on_realtime_event(&event).await,
                Err(RecvError::Lagged(skipped)) => {
                    call.warn(&format!("Dropped {} OpenAI events", skipped)).await;
                    continue;
                }
                Err(RecvError::Closed) => {
                    call.info("OpenAI event stream ended").await;
                    return Ok(());
                }
            },
        };

        for action in actions {
            match action {
                Action::ToRealtime(event) => client.send_client_event(event).await?,
                Action::ToTwilio(message) => {
                    let text = serde_json::to_string(&message)?;
                    outbound
                        .send(text)
                        .await
                        .map_err(|e| RelayError::TwilioSend(e.to_string()))?;
                }
                Action::Finish => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use futures::channel::mpsc;
    use mockall::mock;
    use supplydrop_realtime::Stats;
    use supplydrop_realtime::types::audio::Voice;
    use supplydrop_realtime::types::{ClientEvent, ServerEvent};
    use tempfile::tempdir;
    use tokio::sync::{broadcast, mpsc as tokio_mpsc};

    use crate::relay::session_config;

    mock! {
        pub Realtime {}
        #[async_trait]
        impl RealtimeClient for Realtime {
            async fn update_session(&mut self, config: Session) -> Result<()>;
            async fn send_client_event(&mut self, event: ClientEvent) -> Result<()>;
            async fn server_events(&mut self) -> Result<ServerRx>;
            fn stats(&self) -> Result<Stats>;
            async fn close(&mut self) -> Result<()>;
        }
    }

    const START: &str = r#"{"event":"start","sequenceNumber":"1","start":{"streamSid":"MZ1","accountSid":"AC1","callSid":"CA1","tracks":["inbound"],"customParameters":{},"mediaFormat":{"encoding":"audio/x-mulaw","sampleRate":8000,"channels":1}},"streamSid":"MZ1"}"#;
    const MEDIA: &str = r#"{"event":"media","sequenceNumber":"2","media":{"track":"inbound","chunk":"1","timestamp":"5","payload":"/////w=="},"streamSid":"MZ1"}"#;
    const STOP: &str = r#"{"event":"stop","sequenceNumber":"3","streamSid":"MZ1","stop":{"accountSid":"AC1","callSid":"CA1"}}"#;

    /// A mock that hands out `events` and reports every client event it is
    /// asked to send on the returned channel.
    fn mock_client(
        events: ServerRx,
    ) -> (MockRealtime, tokio_mpsc::UnboundedReceiver<ClientEvent>) {
        let (sent_tx, sent_rx) = tokio_mpsc::unbounded_channel();
        let mut client = MockRealtime::new();
        client
            .expect_update_session()
            .withf(|session| session.instructions() == Some("You help callers."))
            .times(1)
            .returning(|_| Ok(()));
        client
            .expect_server_events()
            .times(1)
            .return_once(move || Ok(events));
        client.expect_send_client_event().returning(move |event| {
            let _ = sent_tx.send(event);
            Ok(())
        });
        client.expect_stats().returning(|| Ok(Stats::new()));
        client.expect_close().times(1).returning(|| Ok(()));
        (client, sent_rx)
    }

    fn session() -> Session {
        session_config("You help callers.", Voice::Shimmer)
    }

    #[tokio::test]
    async fn relays_audio_both_ways_until_stop() {
        let dir = tempdir().unwrap();
        let (events_tx, events_rx) = broadcast::channel(16);
        let (client, mut sent) = mock_client(events_rx);
        let (inbound_tx, inbound_rx) = mpsc::unbounded::<String>();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded::<String>();

        let call = CallSession::new(dir.path().to_path_buf(), true);
        let handle = tokio::spawn(run(client, session(), call, inbound_rx, outbound_tx));

        inbound_tx.unbounded_send(START.to_string()).unwrap();
        inbound_tx.unbounded_send("not json".to_string()).unwrap();
        inbound_tx.unbounded_send(MEDIA.to_string()).unwrap();

        match sent.recv().await.unwrap() {
            ClientEvent::InputAudioBufferAppend(append) => assert_eq!(append.audio(), "/////w=="),
            other => panic!("unexpected client event: {:?}", other),
        }

        events_tx
            .send(
                ServerEvent::from_json(
                    r#"{"type":"response.audio.delta","event_id":"ev","response_id":"resp_1","item_id":"item_1","output_index":0,"content_index":0,"delta":"AAAA"}"#,
                )
                .unwrap(),
            )
            .unwrap();

        let frame = outbound_rx.next().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "media", "streamSid": "MZ1", "media": {"payload": "AAAA"}})
        );

        inbound_tx.unbounded_send(STOP.to_string()).unwrap();
        let log_path = handle.await.unwrap().unwrap().unwrap();

        let contents = std::fs::read_to_string(log_path).unwrap();
        assert!(contents.contains("Call started - Stream SID: MZ1"));
        assert!(contents.contains("Sent audio response to Twilio"));
        assert!(contents.contains("Call ended"));
    }

    #[tokio::test]
    async fn caller_hangup_closes_realtime_connection() {
        let dir = tempdir().unwrap();
        let (_events_tx, events_rx) = broadcast::channel(16);
        let (client, _sent) = mock_client(events_rx);
        let (inbound_tx, inbound_rx) = mpsc::unbounded::<String>();
        let (outbound_tx, _outbound_rx) = mpsc::unbounded::<String>();

        inbound_tx.unbounded_send(START.to_string()).unwrap();
        drop(inbound_tx);

        let call = CallSession::new(dir.path().to_path_buf(), true);
        let log_path = run(client, session(), call, inbound_rx, outbound_tx)
            .await
            .unwrap()
            .unwrap();

        let contents = std::fs::read_to_string(log_path).unwrap();
        assert!(contents.contains(" - INFO - Client disconnected"));
        assert!(contents.contains("Call summary:"));
    }

    #[tokio::test]
    async fn realtime_close_ends_the_call() {
        let dir = tempdir().unwrap();
        let (events_tx, events_rx) = broadcast::channel(16);
        let (client, _sent) = mock_client(events_rx);
        let (_inbound_tx, inbound_rx) = mpsc::unbounded::<String>();
        let (outbound_tx, _outbound_rx) = mpsc::unbounded::<String>();

        events_tx
            .send(ServerEvent::Close {
                reason: Some("server shutting down".to_string()),
            })
            .unwrap();

        let call = CallSession::new(dir.path().to_path_buf(), true);
        // No start message arrived, so there is no call log to return.
        let log_path = run(client, session(), call, inbound_rx, outbound_tx)
            .await
            .unwrap();
        assert_eq!(log_path, None);
    }

    #[tokio::test]
    async fn failed_session_update_still_closes_client() {
        let dir = tempdir().unwrap();
        let mut client = MockRealtime::new();
        client
            .expect_update_session()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("socket closed")));
        client.expect_server_events().never();
        client.expect_stats().returning(|| Ok(Stats::new()));
        client.expect_close().times(1).returning(|| Ok(()));
        let (_inbound_tx, inbound_rx) = mpsc::unbounded::<String>();
        let (outbound_tx, _outbound_rx) = mpsc::unbounded::<String>();

        let call = CallSession::new(dir.path().to_path_buf(), true);
        let err = run(client, session(), call, inbound_rx, outbound_tx)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Realtime(_)));
    }

    #[tokio::test]
    async fn twilio_send_failure_ends_the_call() {
        let dir = tempdir().unwrap();
        let (events_tx, events_rx) = broadcast::channel(16);
        let (client, mut sent) = mock_client(events_rx);
        let (inbound_tx, inbound_rx) = mpsc::unbounded::<String>();
        let (outbound_tx, outbound_rx) = mpsc::unbounded::<String>();
        // The Twilio socket is gone before the assistant says anything.
        drop(outbound_rx);

        let call = CallSession::new(dir.path().to_path_buf(), true);
        let handle = tokio::spawn(run(client, session(), call, inbound_rx, outbound_tx));

        inbound_tx.unbounded_send(START.to_string()).unwrap();
        inbound_tx.unbounded_send(MEDIA.to_string()).unwrap();
        assert!(matches!(
            sent.recv().await.unwrap(),
            ClientEvent::InputAudioBufferAppend(_)
        ));

        events_tx
            .send(
                ServerEvent::from_json(
                    r#"{"type":"response.audio.delta","event_id":"ev","response_id":"resp_1","item_id":"item_1","output_index":0,"content_index":0,"delta":"AAAA"}"#,
                )
                .unwrap(),
            )
            .unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, RelayError::TwilioSend(_)));

        let log = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let contents = std::fs::read_to_string(log).unwrap();
        assert!(contents.contains(" - ERROR - Relay error: failed to send to Twilio"));
        assert!(contents.contains("Call summary:"));
    }
}
