use std::fmt;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Internal id of a registered chat group (not the Telegram chat id).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub String);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Game played in a group. The selectable set is static.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameplayType {
    QuickThere,
    BigSmall,
}

impl GameplayType {
    /// Selector order.
    pub const ALL: [GameplayType; 2] = [GameplayType::QuickThere, GameplayType::BigSmall];

    pub fn as_str(self) -> &'static str {
        match self {
            GameplayType::QuickThere => "quick_there",
            GameplayType::BigSmall => "big_small",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            GameplayType::QuickThere => "Quick Three",
            GameplayType::BigSmall => "Big / Small",
        }
    }

    /// Whether this game is configured with its own odds table.
    pub fn has_odds(self) -> bool {
        matches!(self, GameplayType::QuickThere)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameplayStatus {
    On,
    Off,
}

impl GameplayStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GameplayStatus::On => "on",
            GameplayStatus::Off => "off",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "on" => Some(GameplayStatus::On),
            "off" => Some(GameplayStatus::Off),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            GameplayStatus::On => "On",
            GameplayStatus::Off => "Off",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            GameplayStatus::On => GameplayStatus::Off,
            GameplayStatus::Off => GameplayStatus::On,
        }
    }
}

/// Whether the bot is still present in the group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChatGroupStatus {
    Normal,
    Kicked,
}

impl ChatGroupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatGroupStatus::Normal => "normal",
            ChatGroupStatus::Kicked => "kicked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(ChatGroupStatus::Normal),
            "kicked" => Some(ChatGroupStatus::Kicked),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatGroup {
    pub id: GroupId,
    pub tg_chat_id: i64,
    pub title: String,
    pub gameplay_type: GameplayType,
    pub gameplay_status: GameplayStatus,
    /// Minutes between draws.
    pub draw_cycle: u32,
    pub status: ChatGroupStatus,
}

/// Grants `admin` the right to configure `group_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminLink {
    pub group_id: GroupId,
    pub admin: UserId,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuickThereConfig {
    pub simple_odds: f64,
    pub triplet_odds: f64,
}

/// Numeric group settings edited through a private-chat prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigField {
    DrawCycle,
    SimpleOdds,
    TripletOdds,
}

impl ConfigField {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigField::DrawCycle => "draw_cycle",
            ConfigField::SimpleOdds => "simple_odds",
            ConfigField::TripletOdds => "triplet_odds",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draw_cycle" => Some(ConfigField::DrawCycle),
            "simple_odds" => Some(ConfigField::SimpleOdds),
            "triplet_odds" => Some(ConfigField::TripletOdds),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gameplay_type_wire_names_round_trip() {
        for t in GameplayType::ALL {
            assert_eq!(GameplayType::parse(t.as_str()), Some(t));
        }
        assert_eq!(GameplayType::parse("QuickThere"), None);
    }

    #[test]
    fn only_quick_there_has_odds() {
        assert!(GameplayType::QuickThere.has_odds());
        assert!(!GameplayType::BigSmall.has_odds());
    }
}
