/**
 * Room Streaming over WebSocket
 *
 * `GET /rooms/{room_id}/stream` authenticates and resolves the room before
 * upgrading, so those errors are reported with a plain HTTP status. The
 * room subscription is only opened once the request is known to be a
 * WebSocket upgrade.
 * After the upgrade, client text frames are message bodies and the server
 * sends each room message as a JSON `EnrichedMessage` text frame.
 *
 * # Closing
 *
 * The socket is closed with `1000` when the session ends normally, with
 * `1011` when it ends because of a server failure and with `1008` when it
 * ends on an authorization failure. Server shutdown ends live sessions
 * normally.
 */

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};

use crate::backend::chat::{InboundStream, OutboundSink, RoomSession, StreamError};
use crate::backend::error::ChatError;
use crate::backend::middleware::BearerToken;
use crate::backend::server::AppState;
use crate::shared::EnrichedMessage;

/// Close code for a session that ended normally
const CLOSE_NORMAL: u16 = 1000;

/// `GET /rooms/{room_id}/stream`
pub async fn stream_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    token: BearerToken,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ChatError> {
    let (user, room_id) = state.service.admit(token.as_str(), &room_id).await?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!(room_id = %room_id, "[Server] Stream request was not a WebSocket upgrade");
            return Ok(rejection.into_response());
        }
    };

    let session = state.service.open_session(user, room_id).await?;
    let cancel = state.shutdown_signal();
    Ok(ws.on_upgrade(move |socket| run_socket(socket, session, cancel)))
}

async fn run_socket(
    socket: WebSocket,
    session: RoomSession,
    cancel: impl std::future::Future<Output = ()> + Send,
) {
    let room_id = session.room_id().clone();
    let (sink, stream) = socket.split();
    let mut outbound = WsOutbound::new(sink);

    let result = session.run(WsInbound(stream), &mut outbound, cancel).await;

    let frame = match &result {
        Ok(()) => CloseFrame {
            code: CLOSE_NORMAL,
            reason: "".into(),
        },
        Err(e) => CloseFrame {
            code: e.close_code(),
            reason: e.message().into(),
        },
    };
    if let Err(e) = outbound.finish(frame).await {
        tracing::debug!(room_id = %room_id, error = %e, "[Server] Failed to send close frame");
    }
}

/// Client frames of a room socket
struct WsInbound(SplitStream<WebSocket>);

#[async_trait]
impl InboundStream for WsInbound {
    async fn recv(&mut self) -> Result<Option<String>, StreamError> {
        loop {
            match self.0.next().await {
                None | Some(Ok(WsMessage::Close(_))) => return Ok(None),
                Some(Ok(WsMessage::Text(text))) => return Ok(Some(text.as_str().to_string())),
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => {
                        tracing::debug!("[Server] Ignoring non-UTF-8 binary frame");
                    }
                },
                // Pings are answered by axum.
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
                Some(Err(e)) => return Err(StreamError::Transport(e.to_string())),
            }
        }
    }
}

/// Server half of a room socket
///
/// `close` stops further sends; the close frame carrying the session outcome
/// is sent by [`WsOutbound::finish`] once the session has returned.
struct WsOutbound {
    sink: SplitSink<WebSocket, WsMessage>,
    closed: bool,
}

impl WsOutbound {
    fn new(sink: SplitSink<WebSocket, WsMessage>) -> Self {
        Self {
            sink,
            closed: false,
        }
    }

    async fn finish(mut self, frame: CloseFrame) -> Result<(), axum::Error> {
        self.sink.send(WsMessage::Close(Some(frame))).await?;
        self.sink.close().await
    }
}

#[async_trait]
impl OutboundSink for WsOutbound {
    async fn send(&mut self, message: EnrichedMessage) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        let json = serde_json::to_string(&message)
            .map_err(|e| StreamError::Transport(e.to_string()))?;
        self.sink
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.closed = true;
        self.sink
            .flush()
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))
    }
}
