//! Messaging-platform webhook.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::telegram::{Message, Messenger, Update};

const RECEIVED: &str = "received";

/// Handle one update posted on `/<bot-token>`.
///
/// Once the body decodes, the platform always gets `200 received`: failures
/// past that point are logged, since non-2xx answers are redelivered.
pub async fn handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: Bytes,
) -> Result<&'static str> {
    if state.config.telegram_token() != Some(token.as_str()) {
        return Err(ServerError::NotFound);
    }

    let update: Update =
        serde_json::from_slice(&body).map_err(ServerError::InvalidUpdate)?;

    let Some(message) = update.message.filter(|message| message.text.is_some())
    else {
        tracing::debug!(update_id = update.update_id, "update ignored");
        return Ok(RECEIVED);
    };

    dispatch(&state, &message).await;

    Ok(RECEIVED)
}

async fn dispatch(state: &AppState, message: &Message) {
    let chat_id = message.chat.id;
    spawn_typing(Arc::clone(&state.messenger), chat_id);

    // background work (expense creation) keeps running detached.
    let turn = state.bot.handle(message).await;

    if !turn.reply.text.is_empty() {
        if let Err(err) = state.messenger.send_message(chat_id, &turn.reply.text).await {
            tracing::error!(chat_id, error = %err, "reply not sent");
        }
    }

    if let Some(path) = turn.reply.document {
        if let Err(err) = state.messenger.send_document(chat_id, &path).await {
            tracing::error!(chat_id, error = %err, "document not sent");
        }

        if let Err(err) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %err, "export not removed");
        }
    }
}

fn spawn_typing(messenger: Arc<dyn Messenger>, chat_id: i64) {
    tokio::spawn(async move {
        if let Err(err) = messenger.send_typing(chat_id).await {
            tracing::warn!(chat_id, error = %err, "typing indicator not sent");
        }
    });
}
