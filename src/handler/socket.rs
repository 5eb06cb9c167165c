use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query,
    },
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    db::userdb::UserExt,
    dtos::notificationdtos::SocketQueryDto,
    error::{ErrorCode, ErrorMessage, HttpError},
    utils::token::{self, TokenKind},
    AppState,
};

pub fn socket_handler() -> Router {
    Router::new().route("/ws", get(connect))
}

/// Browsers cannot set headers on the upgrade request, so the access token
/// travels in the query string.
pub async fn connect(
    ws: WebSocketUpgrade,
    Query(query_params): Query<SocketQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let claims = token::decode_token(
        query_params.token,
        app_state.env.jwt_secret.as_bytes(),
        TokenKind::Access,
    )?;

    let user = app_state
        .db_client
        .get_user(Some(claims.id), None, None)
        .await?
        .ok_or_else(|| {
            HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string())
                .with_code(ErrorCode::UserNoLongerExists)
        })?;

    Ok(ws.on_upgrade(move |socket| serve_socket(socket, app_state, user.id)))
}

async fn serve_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: i64) {
    let hub = app_state.notifications.sockets().clone();
    let mut events = hub.subscribe(user_id);
    let (mut sender, mut receiver) = socket.split();

    tracing::debug!("socket opened for user {} ({} online)", user_id, hub.online_users());

    let mut forward = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("socket for user {} skipped {} events", user_id, skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("could not encode socket event: {}", e);
                    continue;
                }
            };

            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // the client only ever pings or closes
    let mut listen = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    // the receiver must be dropped before release() counts subscribers
    tokio::select! {
        _ = &mut forward => {
            listen.abort();
            let _ = listen.await;
        }
        _ = &mut listen => {
            forward.abort();
            let _ = forward.await;
        }
    }

    hub.release(user_id);
    tracing::debug!("socket closed for user {}", user_id);
}
