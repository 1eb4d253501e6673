//! Menu navigation engine.
//!
//! A callback route is parsed, its token resolved to typed parameters, the caller authorized
//! and the screen's data fetched; then a pure screen renders and every outgoing button gets a
//! freshly minted token. Failures surface as one [`Error`] before anything is rendered.

pub mod keyboard;
pub mod screens;

use std::sync::Arc;

use crate::{
    domain::{ChatGroup, ConfigField, GameplayType, GroupId, QuickThereConfig, UserId},
    errors::Error,
    messaging::types::{CallbackEvent, EditMessage},
    params::CallbackParams,
    route::{self, Action, RouteToken},
    store::{GroupStore, GroupUpdate},
    tokens::{PrivateChatSession, SessionCache, TokenStore},
    Result,
};

pub use keyboard::{materialize, Button, MenuReply, Screen};
pub use screens::ScreenContext;

#[derive(Clone, Debug)]
pub struct MenuSettings {
    pub button_label_max_length: usize,
    pub max_draw_cycle: u32,
    pub max_odds: f64,
    /// Odds row created when a group first switches to a game with odds.
    pub default_odds: QuickThereConfig,
}

impl Default for MenuSettings {
    fn default() -> Self {
        Self {
            button_label_max_length: 30,
            max_draw_cycle: 1440,
            max_odds: 1000.0,
            default_odds: QuickThereConfig {
                simple_odds: 2.0,
                triplet_odds: 30.0,
            },
        }
    }
}

/// The edit to apply plus an optional short confirmation for the callback answer.
#[derive(Clone, Debug, PartialEq)]
pub struct CallbackOutcome {
    pub edit: EditMessage,
    pub notice: Option<String>,
}

pub struct MenuEngine {
    tokens: Arc<dyn TokenStore>,
    sessions: Arc<dyn SessionCache>,
    groups: Arc<dyn GroupStore>,
    settings: MenuSettings,
}

impl MenuEngine {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        sessions: Arc<dyn SessionCache>,
        groups: Arc<dyn GroupStore>,
        settings: MenuSettings,
    ) -> Self {
        Self {
            tokens,
            sessions,
            groups,
            settings,
        }
    }

    /// The top-level menu. Opening it abandons any field edit the user left pending.
    pub async fn main_menu(&self, user: UserId) -> Result<MenuReply> {
        self.cancel_pending_edit(user).await?;
        self.reply(&ScreenContext::MainMenu).await
    }

    /// Reset the user's session to idle if it is waiting for a typed value.
    pub async fn cancel_pending_edit(&self, user: UserId) -> Result<()> {
        let pending = self
            .sessions
            .load(user)
            .await?
            .and_then(|s| s.pending_edit());
        if let Some((field, group)) = pending {
            self.sessions.save(user, &PrivateChatSession::idle()).await?;
            tracing::debug!(user = user.0, group = %group, field = field.as_str(), "pending edit cancelled");
        }
        Ok(())
    }

    pub async fn handle_callback(&self, event: &CallbackEvent) -> Result<CallbackOutcome> {
        let route = route::parse(&event.data)?;
        let target = event.message.ok_or_else(|| {
            Error::TokenNotFound(format!("callback {} has no message", event.callback_id))
        })?;

        let params = match &route.token {
            RouteToken::Token(token) => {
                let bag = self.tokens.resolve(token).await?;
                Some(CallbackParams::from_bag(&bag)?)
            }
            RouteToken::NoToken => None,
        };
        if !opens_prompt(route.action) {
            self.cancel_pending_edit(event.user_id).await?;
        }

        let (ctx, notice) = self.dispatch(route.action, params, event.user_id).await?;
        let reply = self.reply(&ctx).await?;
        Ok(CallbackOutcome {
            edit: EditMessage {
                target,
                text: reply.text,
                keyboard: reply.keyboard,
            },
            notice,
        })
    }

    /// Apply a value typed in the private chat to the field the user's session is waiting on.
    ///
    /// Returns `Ok(None)` when no edit is pending. An unparseable value leaves the session as is
    /// so the user can retry; any other outcome closes the prompt.
    pub async fn handle_private_input(
        &self,
        user: UserId,
        text: &str,
    ) -> Result<Option<MenuReply>> {
        let pending = self
            .sessions
            .load(user)
            .await?
            .and_then(|s| s.pending_edit());
        let Some((field, id)) = pending else {
            return Ok(None);
        };

        let update = parse_field_value(field, text, &self.settings)?;
        let applied = self.apply_edit(&id, user, field, update).await;
        self.sessions.save(user, &PrivateChatSession::idle()).await?;
        applied?;
        tracing::info!(group = %id, user = user.0, field = field.as_str(), "group setting updated");

        let group = self.require_group(&id).await?;
        let ctx = self.config_context(group, Some(describe_update(update))).await?;
        self.reply(&ctx).await.map(Some)
    }

    async fn apply_edit(
        &self,
        id: &GroupId,
        user: UserId,
        field: ConfigField,
        update: GroupUpdate,
    ) -> Result<()> {
        let group = self.authorize(id, user).await?;
        if field != ConfigField::DrawCycle {
            self.require_odds(&group).await?;
        }
        self.groups
            .update_group(id, update, self.settings.default_odds)
            .await
    }

    async fn reply(&self, ctx: &ScreenContext) -> Result<MenuReply> {
        let screen = screens::render(ctx, &self.settings);
        materialize(self.tokens.as_ref(), screen).await
    }

    async fn dispatch(
        &self,
        action: Action,
        params: Option<CallbackParams>,
        user: UserId,
    ) -> Result<(ScreenContext, Option<String>)> {
        match action {
            Action::MainMenu => Ok((ScreenContext::MainMenu, None)),
            Action::JoinedGroup => {
                let ids = self.groups.list_joined_group_ids(user).await?;
                let groups = self.groups_in_order(&ids).await?;
                Ok((ScreenContext::JoinedGroups { groups }, None))
            }
            Action::JoinedGroupDetail => {
                let id = expect_group(action, params)?;
                let group = self.authorize_viewer(&id, user).await?;
                Ok((ScreenContext::JoinedGroupDetail { group }, None))
            }
            Action::AdminGroup => {
                let ids: Vec<GroupId> = self
                    .groups
                    .list_admin_links_by_user(user)
                    .await?
                    .into_iter()
                    .map(|l| l.group_id)
                    .collect();
                let groups = self.groups_in_order(&ids).await?;
                Ok((ScreenContext::AdminGroups { groups }, None))
            }
            Action::AddAdminGroup => Ok((ScreenContext::AddAdminGroup, None)),
            Action::ChatGroupConfig => {
                let id = expect_group(action, params)?;
                let group = self.authorize(&id, user).await?;
                Ok((self.config_context(group, None).await?, None))
            }
            Action::GameplayType => {
                let id = expect_group(action, params)?;
                let group = self.authorize(&id, user).await?;
                Ok((ScreenContext::GameplaySelector { group }, None))
            }
            Action::UpdateGameplayType => {
                let (id, gameplay_type) = expect_type_choice(action, params)?;
                let mut group = self.authorize(&id, user).await?;
                if group.gameplay_type != gameplay_type {
                    self.groups
                        .update_group(
                            &id,
                            GroupUpdate::GameplayType(gameplay_type),
                            self.settings.default_odds,
                        )
                        .await?;
                    tracing::info!(group = %id, user = user.0, gameplay = gameplay_type.as_str(), "gameplay type changed");
                    group = self.require_group(&id).await?;
                }
                let notice = describe_update(GroupUpdate::GameplayType(gameplay_type));
                Ok((self.config_context(group, None).await?, Some(notice)))
            }
            Action::UpdateGameplayStatus => {
                let id = expect_group(action, params)?;
                let group = self.authorize(&id, user).await?;
                let update = GroupUpdate::GameplayStatus(group.gameplay_status.toggled());
                self.groups
                    .update_group(&id, update, self.settings.default_odds)
                    .await?;
                tracing::info!(group = %id, user = user.0, "gameplay status toggled");
                let group = self.require_group(&id).await?;
                Ok((
                    self.config_context(group, None).await?,
                    Some(describe_update(update)),
                ))
            }
            Action::UpdateGameDrawCycle => {
                self.prompt(action, params, user, ConfigField::DrawCycle)
                    .await
            }
            Action::SimpleOddsUpdate => {
                self.prompt(action, params, user, ConfigField::SimpleOdds)
                    .await
            }
            Action::TripletOddsUpdate => {
                self.prompt(action, params, user, ConfigField::TripletOdds)
                    .await
            }
        }
    }

    async fn prompt(
        &self,
        action: Action,
        params: Option<CallbackParams>,
        user: UserId,
        field: ConfigField,
    ) -> Result<(ScreenContext, Option<String>)> {
        let id = expect_field(action, params, field)?;
        let group = self.authorize(&id, user).await?;
        let current = match field {
            ConfigField::DrawCycle => format!("{} min", group.draw_cycle),
            ConfigField::SimpleOdds => format!("{}x", self.require_odds(&group).await?.simple_odds),
            ConfigField::TripletOdds => {
                format!("{}x", self.require_odds(&group).await?.triplet_odds)
            }
        };
        self.sessions
            .save(user, &PrivateChatSession::awaiting(field, &id))
            .await?;
        Ok((
            ScreenContext::FieldPrompt {
                group,
                field,
                current,
            },
            None,
        ))
    }

    /// Admin check first, so non-admins learn nothing about the group.
    async fn authorize(&self, id: &GroupId, user: UserId) -> Result<ChatGroup> {
        if self.groups.query_admin_link(id, user).await?.is_none() {
            return Err(Error::Unauthorized {
                user_id: user.0,
                group: id.0.clone(),
            });
        }
        self.require_group(id).await
    }

    /// Members and admins may read a group's summary.
    async fn authorize_viewer(&self, id: &GroupId, user: UserId) -> Result<ChatGroup> {
        let member = self.groups.list_joined_group_ids(user).await?.contains(id);
        if !member && self.groups.query_admin_link(id, user).await?.is_none() {
            return Err(Error::Unauthorized {
                user_id: user.0,
                group: id.0.clone(),
            });
        }
        self.require_group(id).await
    }

    async fn require_group(&self, id: &GroupId) -> Result<ChatGroup> {
        self.groups
            .query_group_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("group {id}")))
    }

    async fn require_odds(&self, group: &ChatGroup) -> Result<QuickThereConfig> {
        if !group.gameplay_type.has_odds() {
            return Err(Error::NotFound(format!(
                "odds for {} in group {}",
                group.gameplay_type.as_str(),
                group.id
            )));
        }
        self.groups
            .query_quick_there_config(&group.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("odds for group {}", group.id)))
    }

    async fn config_context(
        &self,
        group: ChatGroup,
        notice: Option<String>,
    ) -> Result<ScreenContext> {
        let odds = if group.gameplay_type.has_odds() {
            Some(self.require_odds(&group).await?)
        } else {
            None
        };
        Ok(ScreenContext::GroupConfig {
            group,
            odds,
            notice,
        })
    }

    /// Rows for `ids` in the given order; ids without a row are logged and skipped.
    async fn groups_in_order(&self, ids: &[GroupId]) -> Result<Vec<ChatGroup>> {
        let mut unique: Vec<GroupId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(id.clone());
            }
        }
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.groups.query_groups_by_ids(&unique).await?;
        let mut out = Vec::with_capacity(unique.len());
        for id in &unique {
            match rows.iter().find(|g| &g.id == id) {
                Some(g) => out.push(g.clone()),
                None => tracing::warn!(group = %id, "listed group has no row, skipping"),
            }
        }
        Ok(out)
    }
}

/// Actions that leave the user's session waiting for a typed value.
fn opens_prompt(action: Action) -> bool {
    matches!(
        action,
        Action::UpdateGameDrawCycle | Action::SimpleOddsUpdate | Action::TripletOddsUpdate
    )
}

fn unexpected(action: Action, params: &Option<CallbackParams>) -> Error {
    Error::Decoding(format!(
        "{} cannot use parameters {params:?}",
        action.as_str()
    ))
}

fn expect_group(action: Action, params: Option<CallbackParams>) -> Result<GroupId> {
    match params {
        Some(CallbackParams::GroupRef { group_id }) => Ok(group_id),
        other => Err(unexpected(action, &other)),
    }
}

fn expect_type_choice(
    action: Action,
    params: Option<CallbackParams>,
) -> Result<(GroupId, GameplayType)> {
    match params {
        Some(CallbackParams::GroupTypeChoice {
            group_id,
            gameplay_type,
        }) => Ok((group_id, gameplay_type)),
        other => Err(unexpected(action, &other)),
    }
}

fn expect_field(
    action: Action,
    params: Option<CallbackParams>,
    expected: ConfigField,
) -> Result<GroupId> {
    match params {
        Some(CallbackParams::GroupFieldEdit { group_id, field }) if field == expected => {
            Ok(group_id)
        }
        other => Err(unexpected(action, &other)),
    }
}

fn parse_field_value(field: ConfigField, text: &str, settings: &MenuSettings) -> Result<GroupUpdate> {
    let raw = text.trim();
    match field {
        ConfigField::DrawCycle => match raw.parse::<u32>() {
            Ok(minutes) if (1..=settings.max_draw_cycle).contains(&minutes) => {
                Ok(GroupUpdate::DrawCycle(minutes))
            }
            _ => Err(Error::InvalidInput(format!(
                "Please send a whole number of minutes between 1 and {}.",
                settings.max_draw_cycle
            ))),
        },
        ConfigField::SimpleOdds | ConfigField::TripletOdds => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 && v <= settings.max_odds => {
                Ok(if field == ConfigField::SimpleOdds {
                    GroupUpdate::SimpleOdds(v)
                } else {
                    GroupUpdate::TripletOdds(v)
                })
            }
            _ => Err(Error::InvalidInput(format!(
                "Please send odds as a number above 0 and at most {}.",
                settings.max_odds
            ))),
        },
    }
}

fn describe_update(update: GroupUpdate) -> String {
    match update {
        GroupUpdate::GameplayType(t) => format!("✅ Game set to {}", t.display_name()),
        GroupUpdate::GameplayStatus(s) => format!("✅ Status set to {}", s.display_name()),
        GroupUpdate::DrawCycle(m) => format!("✅ Draw cycle set to {m} min"),
        GroupUpdate::SimpleOdds(v) => format!("✅ Simple odds set to {v}x"),
        GroupUpdate::TripletOdds(v) => format!("✅ Triplet odds set to {v}x"),
    }
}
