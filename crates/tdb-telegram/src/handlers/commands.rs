use tdb_core::{domain::ChatId, errors::Error};

use super::{log_failure, note_delivery, IncomingText};
use crate::router::AppState;

fn parse_command(text: &str) -> String {
    // Telegram may send `/cmd@botname arg1 ...`
    text.trim()
        .split(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

fn help_text(state: &AppState) -> String {
    let cfg = &state.cfg;
    format!(
        "🎲 Dice bot\n\n\
         In a group: an owner or admin sends /start to register it.\n\
         In this chat: /start opens the menu to configure your groups.\n\n\
         Menus expire after {} minutes; send /start to get a fresh one.\n\
         Draw cycles run from 1 to {} minutes, odds up to {}.",
        cfg.callback_token_ttl.as_secs() / 60,
        cfg.max_draw_cycle,
        cfg.max_odds
    )
}

pub(crate) async fn process_command(state: &AppState, msg: IncomingText) {
    match parse_command(&msg.text).as_str() {
        "start" if msg.private => send_main_menu(state, msg.chat_id, &msg).await,
        "start" => register_group(state, &msg).await,
        "help" => {
            let result = state.messenger.send_text(msg.chat_id, &help_text(state)).await;
            note_delivery(state, msg.chat_id, result.map(|_| ())).await;
        }
        // Group chats see every bot's commands; only answer unknown ones in private.
        _ if msg.private => {
            let result = state
                .messenger
                .send_text(msg.chat_id, "Unknown command. Try /start or /help.")
                .await;
            note_delivery(state, msg.chat_id, result.map(|_| ())).await;
        }
        _ => {}
    }
}

async fn send_main_menu(state: &AppState, chat_id: ChatId, msg: &IncomingText) {
    let result = match state.engine.main_menu(msg.user_id).await {
        Ok(menu) => state
            .messenger
            .send_menu(chat_id, &menu.text, &menu.keyboard)
            .await
            .map(|_| ()),
        Err(e) => {
            log_failure(&e, "main menu", msg.user_id);
            state
                .messenger
                .send_text(chat_id, &e.user_message())
                .await
                .map(|_| ())
        }
    };
    note_delivery(state, chat_id, result).await;
}

async fn register_group(state: &AppState, msg: &IncomingText) {
    let title = msg.chat_title.clone().unwrap_or_else(|| msg.chat_id.0.to_string());
    let outcome = match state.messenger.get_chat_member(msg.chat_id, msg.user_id).await {
        Ok(role) => {
            state
                .registrar
                .register(msg.chat_id.0, &title, msg.user_id, role)
                .await
        }
        Err(e) => Err(e),
    };

    let reply = match outcome {
        Ok(group) => format!(
            "✅ {} is registered. Open a private chat with me and send /start to configure it.",
            group.title
        ),
        Err(e @ Error::Unauthorized { .. }) => {
            log_failure(&e, "group registration", msg.user_id);
            "⛔ Only the group owner or an administrator can register this group.".to_string()
        }
        Err(e) => {
            log_failure(&e, "group registration", msg.user_id);
            e.user_message()
        }
    };

    let result = state.messenger.send_text(msg.chat_id, &reply).await;
    note_delivery(state, msg.chat_id, result.map(|_| ())).await;
}

#[cfg(test)]
mod tests {
    use tdb_core::{
        domain::{ChatId, UserId},
        messaging::types::ChatMemberRole,
        store::GroupStore,
    };

    use super::*;
    use crate::handlers::test_support::{harness, Sent};

    fn msg(chat_id: i64, private: bool, text: &str) -> IncomingText {
        IncomingText {
            chat_id: ChatId(chat_id),
            private,
            chat_title: (!private).then(|| "Dice Night".to_string()),
            user_id: UserId(9),
            text: text.to_string(),
        }
    }

    #[test]
    fn parses_command_with_bot_suffix() {
        assert_eq!(parse_command("/start@dice_bot now"), "start");
        assert_eq!(parse_command("/HELP"), "help");
    }

    #[tokio::test]
    async fn private_start_sends_the_main_menu() {
        let h = harness();
        process_command(&h.state, msg(9, true, "/start")).await;

        let sent = h.messenger.sent();
        let [Sent::Menu(9, _, keyboard)] = sent.as_slice() else {
            panic!("expected one menu, got {sent:?}");
        };
        let data: Vec<_> = keyboard.buttons().map(|b| b.callback_data.as_str()).collect();
        assert_eq!(data, ["joined_group", "admin_group"]);
    }

    #[tokio::test]
    async fn group_start_by_admin_registers_the_group() {
        let h = harness();
        *h.messenger.role.lock().unwrap() = Some(ChatMemberRole::Administrator);
        process_command(&h.state, msg(-100, false, "/start")).await;

        let links = h.store.list_admin_links_by_user(UserId(9)).await.unwrap();
        assert_eq!(links.len(), 1);
        let group = h.store.query_group_by_id(&links[0].group_id).await.unwrap().unwrap();
        assert_eq!(group.title, "Dice Night");
        assert_eq!(group.tg_chat_id, -100);
        assert!(matches!(&h.messenger.sent()[0], Sent::Text(-100, t) if t.starts_with("✅")));
    }

    #[tokio::test]
    async fn group_start_by_member_is_refused() {
        let h = harness();
        process_command(&h.state, msg(-100, false, "/start")).await;

        assert!(h.store.list_admin_links_by_user(UserId(9)).await.unwrap().is_empty());
        assert_eq!(h.store.write_count(), 0);
        assert!(matches!(&h.messenger.sent()[0], Sent::Text(-100, t) if t.starts_with("⛔")));
    }

    #[tokio::test]
    async fn unknown_group_commands_are_ignored() {
        let h = harness();
        process_command(&h.state, msg(-100, false, "/roll")).await;
        assert!(h.messenger.sent().is_empty());
    }
}
