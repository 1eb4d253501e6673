use super::{log_failure, note_delivery, IncomingText};
use crate::router::AppState;

/// Plain text in a private chat answers a pending field prompt, if there is one.
pub(crate) async fn process_private_text(state: &AppState, msg: IncomingText) {
    let result = match state
        .engine
        .handle_private_input(msg.user_id, &msg.text)
        .await
    {
        Ok(Some(menu)) => state
            .messenger
            .send_menu(msg.chat_id, &menu.text, &menu.keyboard)
            .await
            .map(|_| ()),
        Ok(None) => state
            .messenger
            .send_text(msg.chat_id, "Send /start to open the menu.")
            .await
            .map(|_| ()),
        Err(e) => {
            log_failure(&e, "private input", msg.user_id);
            state
                .messenger
                .send_text(msg.chat_id, &e.user_message())
                .await
                .map(|_| ())
        }
    };
    note_delivery(state, msg.chat_id, result).await;
}
