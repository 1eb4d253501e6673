//! Telegram adapter (teloxide).
//!
//! Implements the `tdb-core` [`MessagingPort`] over the Bot API and routes updates into the
//! menu engine.

use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{ChatMemberKind, InlineKeyboardButton, InlineKeyboardMarkup},
};
use tokio::time::sleep;

pub mod handlers;
pub mod router;

use tdb_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatMemberRole, EditMessage, KeyboardLayout},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    tracing::debug!(?d, "rate limited by telegram, retrying");
                    sleep(d).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }
}

pub(crate) fn markup(keyboard: &KeyboardLayout) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.callback_data.clone()))
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

pub(crate) fn member_role(kind: &ChatMemberKind) -> ChatMemberRole {
    match kind {
        ChatMemberKind::Owner(_) => ChatMemberRole::Owner,
        ChatMemberKind::Administrator(_) => ChatMemberRole::Administrator,
        ChatMemberKind::Member => ChatMemberRole::Member,
        ChatMemberKind::Restricted(_) => ChatMemberRole::Restricted,
        ChatMemberKind::Left => ChatMemberRole::Left,
        ChatMemberKind::Banned(_) => ChatMemberRole::Banned,
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| self.bot.send_message(Self::tg_chat(chat_id), text.to_string()))
            .await?;
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_menu(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: &KeyboardLayout,
    ) -> Result<MessageRef> {
        let markup = markup(keyboard);
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), text.to_string())
                    .reply_markup(markup.clone())
            })
            .await?;
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn edit_menu(&self, edit: &EditMessage) -> Result<()> {
        let markup = markup(&edit.keyboard);
        self.with_retry(|| {
            self.bot
                .edit_message_text(
                    Self::tg_chat(edit.target.chat_id),
                    Self::tg_msg_id(edit.target.message_id),
                    edit.text.clone(),
                )
                .reply_markup(markup.clone())
        })
        .await?;
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string()).show_alert(show_alert);
            }
            req
        })
        .await?;
        Ok(())
    }

    async fn get_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<ChatMemberRole> {
        let tg_user = u64::try_from(user_id.0)
            .map(teloxide::types::UserId)
            .map_err(|_| Error::External(format!("invalid telegram user id {}", user_id.0)))?;
        let member = self
            .with_retry(|| self.bot.get_chat_member(Self::tg_chat(chat_id), tg_user))
            .await?;
        Ok(member_role(&member.kind))
    }
}
