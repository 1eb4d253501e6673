//! Telegram update handlers.
//!
//! Each handler converts the teloxide update into a transport-neutral value and hands it to a
//! `process_*` function, so the flows are testable without a live bot.

use std::sync::Arc;

use teloxide::{prelude::*, types::CallbackQuery};

use tdb_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::types::CallbackEvent,
};

use crate::router::AppState;

mod callback;
mod commands;
mod text;

/// A text message, stripped down to what the handlers read.
#[derive(Clone, Debug)]
pub(crate) struct IncomingText {
    pub chat_id: ChatId,
    pub private: bool,
    pub chat_title: Option<String>,
    pub user_id: UserId,
    pub text: String,
}

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let event = CallbackEvent {
        callback_id: q.id.clone(),
        user_id: UserId(q.from.id.0 as i64),
        message: q.message.as_ref().map(|m| MessageRef {
            chat_id: ChatId(m.chat.id.0),
            message_id: MessageId(m.id.0),
        }),
        data: q.data.clone().unwrap_or_default(),
    };
    callback::process_callback(&state, event).await;
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let (Some(user), Some(text)) = (msg.from(), msg.text()) else {
        return Ok(());
    };
    let incoming = IncomingText {
        chat_id: ChatId(msg.chat.id.0),
        private: msg.chat.is_private(),
        chat_title: msg.chat.title().map(str::to_string),
        user_id: UserId(user.id.0 as i64),
        text: text.to_string(),
    };

    if incoming.text.starts_with('/') {
        commands::process_command(&state, incoming).await;
    } else if incoming.private {
        text::process_private_text(&state, incoming).await;
    }
    Ok(())
}

/// Log a failed operation at a level matching who is at fault.
pub(crate) fn log_failure(err: &Error, what: &str, user_id: UserId) {
    if err.is_internal() {
        tracing::error!(error = %err, user = user_id.0, "{what} failed");
    } else {
        tracing::warn!(error = %err, user = user_id.0, "{what} failed");
    }
}

/// Record the outcome of sending into `chat_id`; a kicked bot marks the group.
/// Returns true when the delivery failed for a reason the registrar does not recognize.
pub(crate) async fn note_delivery(
    state: &AppState,
    chat_id: ChatId,
    result: tdb_core::Result<()>,
) -> bool {
    let Err(err) = result else {
        return false;
    };
    match state.registrar.handle_delivery_failure(chat_id.0, &err).await {
        Ok(Some(_)) => false,
        Ok(None) => {
            tracing::warn!(error = %err, chat = chat_id.0, "delivery failed");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, chat = chat_id.0, "could not record delivery failure");
            true
        }
    }
}
