use tdb_core::{errors::Error, messaging::types::CallbackEvent};

use super::{log_failure, note_delivery};
use crate::router::AppState;

/// Run a tapped button through the menu engine. The callback is always answered: with the
/// confirmation on success, with an alert carrying the user-facing message on failure or
/// when the edit itself could not be delivered.
pub(crate) async fn process_callback(state: &AppState, event: CallbackEvent) {
    let (answer, alert) = match state.engine.handle_callback(&event).await {
        Ok(outcome) => {
            let chat_id = outcome.edit.target.chat_id;
            let edited = state.messenger.edit_menu(&outcome.edit).await;
            if note_delivery(state, chat_id, edited).await {
                (Some(Error::Unavailable(String::new()).user_message()), true)
            } else {
                (outcome.notice, false)
            }
        }
        Err(e) => {
            log_failure(&e, &format!("callback {:?}", event.data), event.user_id);
            (Some(e.user_message()), true)
        }
    };

    if let Err(e) = state
        .messenger
        .answer_callback_query(&event.callback_id, answer.as_deref(), alert)
        .await
    {
        tracing::warn!(error = %e, "answer_callback_query failed");
    }
}
