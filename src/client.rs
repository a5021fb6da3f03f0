use crate::types;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use types::audio::Base64EncodedAudioBytes;
use types::events::client::{
    InputAudioBufferAppendEvent, ResponseCancelEvent, ResponseCreateEvent, SessionUpdateEvent,
};
use types::session::Session;

mod config;
mod consts;
mod stats;
mod utils;

pub use config::{Config, ConfigBuilder};
pub use stats::Stats;

pub type ClientTx = tokio::sync::mpsc::Sender<types::ClientEvent>;
type ServerTx = tokio::sync::broadcast::Sender<types::ServerEvent>;
pub type ServerRx = tokio::sync::broadcast::Receiver<types::ServerEvent>;

/// The operations a call relay needs from a realtime connection.
#[async_trait]
pub trait RealtimeClient: Send {
    async fn update_session(&mut self, config: Session) -> Result<()>;
    async fn send_client_event(&mut self, event: types::ClientEvent) -> Result<()>;
    async fn server_events(&mut self) -> Result<ServerRx>;
    fn stats(&self) -> Result<Stats>;
    async fn close(&mut self) -> Result<()>;
}

struct Connection {
    send_handle: tokio::task::JoinHandle<()>,
    recv_handle: tokio::task::JoinHandle<()>,
}

// Holds the channel capacity, the client/server transmitters, the connection
// tasks and token usage stats.
pub struct Client {
    capacity: usize,
    config: Config,
    c_tx: Option<ClientTx>,
    s_tx: Option<ServerTx>,
    s_rx: Option<ServerRx>,
    connection: Option<Connection>,
    stats: Arc<Mutex<Stats>>,
}

impl Client {
    fn new(capacity: usize, config: Config) -> Self {
        Self {
            capacity,
            config,
            c_tx: None,
            s_tx: None,
            s_rx: None,
            connection: None,
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    async fn connect(&mut self) -> Result<()> {
        if self.c_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }

        let request = utils::build_request(&self.config)?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        tracing::info!(model = %self.config.model(), "connected to realtime api");

        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel::<types::ClientEvent>(self.capacity);
        let (s_tx, s_rx) = tokio::sync::broadcast::channel(self.capacity);

        self.c_tx = Some(c_tx);
        self.s_tx = Some(s_tx.clone());
        self.s_rx = Some(s_rx);

        // Drains client events until every sender is dropped, then closes the socket.
        let send_handle = tokio::spawn(async move {
            while let Some(event) = c_rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send message: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize event: {}", e);
                    }
                }
            }
            if let Err(e) = write.close().await {
                tracing::debug!("failed to close realtime socket: {}", e);
            }
        });

        let stats = self.stats.clone();
        let recv_handle = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => match types::ServerEvent::from_json(&text) {
                        Ok(event) => {
                            tracing::debug!("received message: {}", event.event_type());

                            if let types::ServerEvent::ResponseDone(ref done) = event {
                                if let Some(usage) = done.response().usage() {
                                    if let Ok(mut stats_guard) = stats.lock() {
                                        stats_guard.update_usage(
                                            usage.total_tokens(),
                                            usage.input_tokens(),
                                            usage.output_tokens(),
                                        );
                                    } else {
                                        tracing::error!("failed to update stats");
                                    }
                                }
                            }

                            let _ = s_tx.send(event);
                        }
                        Err(e) => {
                            tracing::error!("failed to deserialize event: {}, text=> {:?}", e, text);
                        }
                    },
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        let close_event = types::ServerEvent::Close {
                            reason: reason.map(|frame| frame.reason.to_string()),
                        };
                        let _ = s_tx.send(close_event);
                        return;
                    }
                    _ => {}
                }
            }
            let _ = s_tx.send(types::ServerEvent::Close { reason: None });
        });

        self.connection = Some(Connection {
            send_handle,
            recv_handle,
        });
        Ok(())
    }

    pub async fn append_input_audio_buffer(&mut self, audio: Base64EncodedAudioBytes) -> Result<()> {
        let event = types::ClientEvent::InputAudioBufferAppend(InputAudioBufferAppendEvent::new(audio));
        self.send_client_event(event).await
    }

    pub async fn create_response(&mut self) -> Result<()> {
        let event = types::ClientEvent::ResponseCreate(ResponseCreateEvent::new());
        self.send_client_event(event).await
    }

    pub async fn cancel_response(&mut self) -> Result<()> {
        let event = types::ClientEvent::ResponseCancel(ResponseCancelEvent::new());
        self.send_client_event(event).await
    }
}

#[async_trait]
impl RealtimeClient for Client {
    async fn update_session(&mut self, config: Session) -> Result<()> {
        let event = types::ClientEvent::SessionUpdate(SessionUpdateEvent::new(config));
        self.send_client_event(event).await
    }

    async fn send_client_event(&mut self, event: types::ClientEvent) -> Result<()> {
        match self.c_tx {
            Some(ref tx) => {
                tx.send(event).await?;
                Ok(())
            }
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    // The first call gets every event since connecting; later calls only see
    // events broadcast after they subscribe.
    async fn server_events(&mut self) -> Result<ServerRx> {
        if let Some(rx) = self.s_rx.take() {
            return Ok(rx);
        }
        match self.s_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    fn stats(&self) -> Result<Stats> {
        if let Ok(stats_guard) = self.stats.lock() {
            Ok(stats_guard.clone())
        } else {
            Err(anyhow::anyhow!("failed to get stats"))
        }
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the only sender ends the send task, which closes the socket.
        self.c_tx = None;
        self.s_rx = None;
        if let Some(connection) = self.connection.take() {
            connection.send_handle.await?;
            connection.recv_handle.abort();
        }
        Ok(())
    }
}

pub async fn connect_with_config(capacity: usize, config: Config) -> Result<Client> {
    let mut client = Client::new(capacity, config);
    client.connect().await?;
    Ok(client)
}

pub async fn connect() -> Result<Client> {
    connect_with_config(1024, Config::new()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    /// A listener on a free local port and a client config pointing at it.
    async fn local_endpoint() -> (TcpListener, Config) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = Config::builder()
            .with_base_url(&format!("ws://{}/v1", addr))
            .with_api_key(SecretString::from("sk-test".to_string()))
            .with_model("test-model")
            .build();
        (listener, config)
    }

    #[tokio::test]
    async fn server_frames_reach_subscribers() {
        let (listener, config) = local_endpoint().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                r#"{"type":"response.content.done","event_id":"ev_1"}"#.to_string(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(
                r#"{"type":"response.done","event_id":"ev_2","response":{"id":"resp_1","status":"completed","usage":{"total_tokens":30,"input_tokens":10,"output_tokens":20}}}"#.to_string(),
            ))
            .await
            .unwrap();
            ws.close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "bye".into(),
            }))
            .await
            .unwrap();
            // Drain until the client acknowledges the close.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let mut client = connect_with_config(16, config).await.unwrap();
        let mut events = client.server_events().await.unwrap();

        let unknown = events.recv().await.unwrap();
        assert!(matches!(unknown, types::ServerEvent::Unknown { .. }));
        assert_eq!(unknown.event_type(), "response.content.done");

        match events.recv().await.unwrap() {
            types::ServerEvent::ResponseDone(done) => assert_eq!(done.response().id(), "resp_1"),
            other => panic!("unexpected event: {:?}", other),
        }
        let stats = client.stats().unwrap();
        assert_eq!(stats.total_tokens(), 30);
        assert_eq!(stats.input_tokens(), 10);
        assert_eq!(stats.output_tokens(), 20);
        assert_eq!(stats.responses(), 1);

        match events.recv().await.unwrap() {
            types::ServerEvent::Close { reason } => assert_eq!(reason.as_deref(), Some("bye")),
            other => panic!("unexpected event: {:?}", other),
        }

        client.close().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn close_sends_pending_events_and_closes_socket() {
        let (listener, config) = local_endpoint().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut texts = Vec::new();
            let mut closed = false;
            while let Some(message) = ws.next().await {
                match message {
                    Ok(Message::Text(text)) => texts.push(text),
                    Ok(Message::Close(_)) => {
                        closed = true;
                        break;
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            (texts, closed)
        });

        let mut client = connect_with_config(16, config).await.unwrap();
        client.update_session(Session::builder().build()).await.unwrap();
        client.cancel_response().await.unwrap();
        client.close().await.unwrap();

        let (texts, closed) = server.await.unwrap();
        assert!(closed);
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains(r#""type":"session.update""#));
        assert!(texts[1].contains(r#""type":"response.cancel""#));

        assert!(client.create_response().await.is_err());
    }
}
