use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef, UserId},
    messaging::types::{ChatMemberRole, EditMessage, KeyboardLayout},
    Result,
};

/// Outbound transport port. The menu engine only produces [`EditMessage`] values; handlers
/// deliver them through this trait.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    async fn send_menu(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: &KeyboardLayout,
    ) -> Result<MessageRef>;

    async fn edit_menu(&self, edit: &EditMessage) -> Result<()>;

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()>;

    async fn get_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<ChatMemberRole>;
}
