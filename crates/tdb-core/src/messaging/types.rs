use crate::domain::{MessageRef, UserId};

/// A tapped inline button, as delivered by the transport.
#[derive(Clone, Debug)]
pub struct CallbackEvent {
    pub callback_id: String,
    pub user_id: UserId,
    /// Absent when the originating message is too old for the transport to report it.
    pub message: Option<MessageRef>,
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyboardButton {
    pub label: String,
    pub callback_data: String,
}

/// Inline keyboard: ordered rows of ordered buttons.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyboardLayout {
    pub rows: Vec<Vec<KeyboardButton>>,
}

impl KeyboardLayout {
    pub fn buttons(&self) -> impl Iterator<Item = &KeyboardButton> {
        self.rows.iter().flatten()
    }
}

/// Replace the text and keyboard of a message the bot sent earlier.
#[derive(Clone, Debug, PartialEq)]
pub struct EditMessage {
    pub target: MessageRef,
    pub text: String,
    pub keyboard: KeyboardLayout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatMemberRole {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl ChatMemberRole {
    pub fn is_privileged(self) -> bool {
        matches!(self, ChatMemberRole::Owner | ChatMemberRole::Administrator)
    }
}

/// Transport failures the bot reacts to instead of just logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The user blocked the bot in a private chat.
    Blocked,
    /// The bot was removed from a group.
    Kicked,
    /// An edit produced the same text and keyboard.
    NotModified,
}

impl DeliveryFailure {
    /// Classify a transport error message (Bot API descriptions).
    pub fn classify(message: &str) -> Option<Self> {
        if message.contains("bot was blocked") {
            Some(DeliveryFailure::Blocked)
        } else if message.contains("bot was kicked") {
            Some(DeliveryFailure::Kicked)
        } else if message.contains("message is not modified") {
            Some(DeliveryFailure::NotModified)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_bot_api_descriptions() {
        assert_eq!(
            DeliveryFailure::classify(
                "telegram error: A Telegram's error: Forbidden: bot was kicked from the group chat"
            ),
            Some(DeliveryFailure::Kicked)
        );
        assert_eq!(
            DeliveryFailure::classify("Forbidden: bot was blocked by the user"),
            Some(DeliveryFailure::Blocked)
        );
        assert_eq!(
            DeliveryFailure::classify("Bad Request: message is not modified: specified new message content"),
            Some(DeliveryFailure::NotModified)
        );
        assert_eq!(DeliveryFailure::classify("network down"), None);
    }
}
