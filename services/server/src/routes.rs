use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{future, SinkExt, StreamExt};
use supplydrop_realtime::types::twilio::twiml::VoiceResponse;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::prompt_loader::Prompts;
use crate::relay::{self, CallSession};

pub const HEALTH_MESSAGE: &str = "Twilio Media Stream Server is running!";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub prompts: Arc<Prompts>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/incoming-call", get(incoming_call).post(incoming_call))
        .route("/media-stream", get(media_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": HEALTH_MESSAGE }))
}

/// Answers Twilio's voice webhook: greet the caller, then connect the call
/// audio to `/media-stream` on this host.
async fn incoming_call(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let host = match stream_host(&state.config, &headers, &uri) {
        Some(host) => host,
        None => {
            tracing::warn!("incoming call without a Host header and no PUBLIC_HOST configured");
            return (StatusCode::BAD_REQUEST, "missing Host header").into_response();
        }
    };

    let greeting = &state.prompts.greeting;
    let twiml = VoiceResponse::new()
        .say(&greeting.welcome, Some(&greeting.voice))
        .pause(1)
        .say(&greeting.follow_up, Some(&greeting.voice))
        .connect_stream(&format!("wss://{}/media-stream", host));

    tracing::info!(%host, "answering incoming call");
    ([(header::CONTENT_TYPE, "application/xml")], twiml.to_string()).into_response()
}

/// The configured public host wins; otherwise the request's Host header
/// without its port, or the URI authority for HTTP/2 requests that carry no
/// Host header.
fn stream_host(config: &Config, headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(host) = &config.public_host {
        return Some(host.clone());
    }
    let host = match headers.get(header::HOST) {
        Some(value) => value.to_str().ok()?,
        None => uri.host()?,
    };
    let hostname = match host.strip_prefix('[') {
        // Bracketed IPv6 literal.
        Some(rest) => match rest.find(']') {
            Some(end) => &host[..end + 2],
            None => host,
        },
        None => host.split(':').next().unwrap_or(host),
    };
    let hostname = hostname.trim();
    (!hostname.is_empty()).then(|| hostname.to_string())
}

async fn media_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_media_stream(socket, state))
}

async fn handle_media_stream(mut socket: WebSocket, state: AppState) {
    tracing::info!("Client connected");

    let client = match relay::connect_realtime(&state.config).await {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("failed to connect to OpenAI realtime API: {:#}", e);
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let (sender, receiver) = socket.split();
    let inbound = Box::pin(
        receiver
            .take_while(|message| future::ready(!matches!(message, Ok(Message::Close(_)) | Err(_))))
            .filter_map(|message| {
                future::ready(match message {
                    Ok(Message::Text(text)) => Some(text.to_string()),
                    _ => None,
                })
            }),
    );
    let outbound = Box::pin(sender.with(|text: String| {
        future::ready(Ok::<_, axum::Error>(Message::Text(text.into())))
    }));

    let session = relay::session_config(&state.prompts.system_message, state.config.voice.clone());
    let call = CallSession::new(state.config.logs_dir.clone(), state.config.barge_in);
    match relay::run(client, session, call, inbound, outbound).await {
        Ok(Some(path)) => tracing::info!(log = %path.display(), "call finished"),
        Ok(None) => tracing::info!("media stream closed before the call started"),
        Err(e) => tracing::error!("call relay failed: {}", e),
    }
}
