/// Core error type for the dice bot.
///
/// Adapter crates map their specific errors into this type so every failure that reaches the
/// transport layer is one of a small set of user-facing outcomes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("callback token not found or expired: {0}")]
    TokenNotFound(String),

    #[error("malformed route: {0}")]
    MalformedRoute(String),

    #[error("route for action {action} carries no callback token")]
    MissingToken { action: String },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("id generation failed: {0}")]
    IdGeneration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("user {user_id} is not an admin of group {group}")]
    Unauthorized { user_id: i64, group: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The single message a user sees for this failure. Never includes backend detail.
    pub fn user_message(&self) -> String {
        match self {
            Error::TokenNotFound(_) | Error::MalformedRoute(_) | Error::MissingToken { .. } => {
                "⌛ This menu has expired, please reopen it with /start.".to_string()
            }
            Error::NotFound(_) => "🔍 Group configuration not found.".to_string(),
            Error::Unauthorized { .. } => "⛔ You are not an admin of this group.".to_string(),
            Error::InvalidInput(reason) => format!("⚠️ {reason}"),
            Error::Unavailable(_) => "🔁 Query failed, please try again.".to_string(),
            Error::Encoding(_)
            | Error::Decoding(_)
            | Error::IdGeneration(_)
            | Error::Config(_)
            | Error::External(_) => "❌ Something went wrong, please try again later.".to_string(),
        }
    }

    /// Serialization and id failures point at a bug rather than at the user or a backend.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::Encoding(_) | Error::Decoding(_) | Error::IdGeneration(_)
        )
    }
}
