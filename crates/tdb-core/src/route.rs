//! Route wire format: `<action>?callbackDataKey=<token>`.
//!
//! The route is the only state a button carries back. Menu position is rebuilt from the action
//! name plus the bag its token resolves to.

use url::form_urlencoded;

use crate::{errors::Error, tokens::Token, Result};

pub const CALLBACK_DATA_KEY: &str = "callbackDataKey";

/// Telegram rejects `callback_data` longer than this.
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    MainMenu,
    JoinedGroup,
    JoinedGroupDetail,
    AdminGroup,
    AddAdminGroup,
    ChatGroupConfig,
    GameplayType,
    UpdateGameplayType,
    UpdateGameplayStatus,
    UpdateGameDrawCycle,
    SimpleOddsUpdate,
    TripletOddsUpdate,
}

/// Whether an action's route must reference a stored parameter bag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenRequirement {
    Required,
    None,
}

impl Action {
    pub const ALL: [Action; 12] = [
        Action::MainMenu,
        Action::JoinedGroup,
        Action::JoinedGroupDetail,
        Action::AdminGroup,
        Action::AddAdminGroup,
        Action::ChatGroupConfig,
        Action::GameplayType,
        Action::UpdateGameplayType,
        Action::UpdateGameplayStatus,
        Action::UpdateGameDrawCycle,
        Action::SimpleOddsUpdate,
        Action::TripletOddsUpdate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::MainMenu => "main_menu",
            Action::JoinedGroup => "joined_group",
            Action::JoinedGroupDetail => "joined_group_detail",
            Action::AdminGroup => "admin_group",
            Action::AddAdminGroup => "add_admin_group",
            Action::ChatGroupConfig => "chat_group_config",
            Action::GameplayType => "gameplay_type",
            Action::UpdateGameplayType => "update_gameplay_type",
            Action::UpdateGameplayStatus => "update_gameplay_status",
            Action::UpdateGameDrawCycle => "update_game_draw_cycle",
            Action::SimpleOddsUpdate => "simple_odds_update",
            Action::TripletOddsUpdate => "triplet_odds_update",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }

    pub fn token_requirement(self) -> TokenRequirement {
        match self {
            Action::MainMenu | Action::JoinedGroup | Action::AdminGroup | Action::AddAdminGroup => {
                TokenRequirement::None
            }
            _ => TokenRequirement::Required,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteToken {
    Token(Token),
    /// The action declares it takes no parameters.
    NoToken,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedRoute {
    pub action: Action,
    pub token: RouteToken,
}

/// Split a route on its first `?` into the action segment and the raw query, if any.
pub fn split(route: &str) -> Result<(&str, Option<&str>)> {
    let (action, query) = match route.split_once('?') {
        Some((a, q)) => (a, Some(q)),
        None => (route, None),
    };
    if action.trim().is_empty() {
        return Err(Error::MalformedRoute(format!("empty action in {route:?}")));
    }
    Ok((action, query))
}

/// Look up the callback token in a raw query according to what `action` declares.
pub fn extract_token(action: Action, raw_query: Option<&str>) -> Result<RouteToken> {
    if action.token_requirement() == TokenRequirement::None {
        return Ok(RouteToken::NoToken);
    }
    let Some(query) = raw_query else {
        return Err(Error::MalformedRoute(format!(
            "{} requires a query string",
            action.as_str()
        )));
    };
    form_urlencoded::parse(query.as_bytes())
        .find(|(k, v)| k == CALLBACK_DATA_KEY && !v.is_empty())
        .map(|(_, v)| RouteToken::Token(Token(v.into_owned())))
        .ok_or_else(|| Error::MissingToken {
            action: action.as_str().to_string(),
        })
}

pub fn parse(route: &str) -> Result<ParsedRoute> {
    let (name, query) = split(route)?;
    let action = Action::parse(name)
        .ok_or_else(|| Error::MalformedRoute(format!("unknown action {name:?}")))?;
    let token = extract_token(action, query)?;
    Ok(ParsedRoute { action, token })
}

/// Build the callback payload for a button.
pub fn render(action: Action, token: Option<&Token>) -> Result<String> {
    let route = match token {
        None => action.as_str().to_string(),
        Some(token) => {
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair(CALLBACK_DATA_KEY, &token.0)
                .finish();
            format!("{}?{query}", action.as_str())
        }
    };
    if route.len() > MAX_CALLBACK_DATA_LEN {
        return Err(Error::MalformedRoute(format!(
            "{} bytes exceeds callback payload limit: {route}",
            route.len()
        )));
    }
    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_action_without_query_is_malformed() {
        assert!(matches!(
            parse("update_gameplay_type"),
            Err(Error::MalformedRoute(_))
        ));
    }

    #[test]
    fn token_action_with_foreign_query_is_missing_token() {
        let err = parse("update_gameplay_type?foo=bar").unwrap_err();
        assert!(matches!(err, Error::MissingToken { action } if action == "update_gameplay_type"));
        assert!(matches!(
            parse("update_gameplay_type?callbackDataKey="),
            Err(Error::MissingToken { .. })
        ));
    }

    #[test]
    fn empty_or_unknown_action_is_malformed() {
        assert!(matches!(parse(""), Err(Error::MalformedRoute(_))));
        assert!(matches!(parse("?callbackDataKey=1"), Err(Error::MalformedRoute(_))));
        assert!(matches!(parse("launch_rockets"), Err(Error::MalformedRoute(_))));
    }

    #[test]
    fn token_free_actions_yield_no_token() {
        let r = parse("add_admin_group").unwrap();
        assert_eq!(r.action, Action::AddAdminGroup);
        assert_eq!(r.token, RouteToken::NoToken);

        let r = parse("admin_group?callbackDataKey=ignored").unwrap();
        assert_eq!(r.token, RouteToken::NoToken);
    }

    #[test]
    fn split_keeps_everything_after_the_first_question_mark() {
        assert_eq!(
            split("chat_group_config?a=1?b=2").unwrap(),
            ("chat_group_config", Some("a=1?b=2"))
        );
    }

    #[test]
    fn rendered_routes_parse_back() {
        let token = Token("3b8fkq2x1z9aa".to_string());
        let raw = render(Action::UpdateGameDrawCycle, Some(&token)).unwrap();
        assert_eq!(raw, "update_game_draw_cycle?callbackDataKey=3b8fkq2x1z9aa");
        assert_eq!(
            parse(&raw).unwrap(),
            ParsedRoute {
                action: Action::UpdateGameDrawCycle,
                token: RouteToken::Token(token)
            }
        );
    }

    #[test]
    fn every_action_fits_the_payload_limit_with_a_full_length_token() {
        let token = Token(crate::ids::to_base36(u64::MAX));
        for action in Action::ALL {
            assert!(render(action, Some(&token)).is_ok(), "{}", action.as_str());
        }
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let token = Token("x".repeat(40));
        assert!(matches!(
            render(Action::ChatGroupConfig, Some(&token)),
            Err(Error::MalformedRoute(_))
        ));
    }
}
