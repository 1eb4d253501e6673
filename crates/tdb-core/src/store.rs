//! Relational store port for groups, admin links and per-game configuration.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{
        AdminLink, ChatGroup, ChatGroupStatus, GameplayStatus, GameplayType, GroupId,
        QuickThereConfig, UserId,
    },
    errors::Error,
    Result,
};

/// A single-field change to a group's configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GroupUpdate {
    GameplayType(GameplayType),
    GameplayStatus(GameplayStatus),
    DrawCycle(u32),
    SimpleOdds(f64),
    TripletOdds(f64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewChatGroup {
    pub id: GroupId,
    pub tg_chat_id: i64,
    pub title: String,
    pub gameplay_type: GameplayType,
    pub draw_cycle: u32,
    pub odds: QuickThereConfig,
}

/// Lookups return `Ok(None)` for missing rows; `Err` is reserved for backend failures.
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn query_group_by_id(&self, id: &GroupId) -> Result<Option<ChatGroup>>;

    /// Rows for the ids that exist, in no particular order.
    async fn query_groups_by_ids(&self, ids: &[GroupId]) -> Result<Vec<ChatGroup>>;

    async fn list_admin_links_by_user(&self, admin: UserId) -> Result<Vec<AdminLink>>;

    async fn query_admin_link(&self, group: &GroupId, admin: UserId)
        -> Result<Option<AdminLink>>;

    /// Groups the user has joined as a player, in membership order.
    async fn list_joined_group_ids(&self, user: UserId) -> Result<Vec<GroupId>>;

    async fn query_quick_there_config(&self, group: &GroupId) -> Result<Option<QuickThereConfig>>;

    /// Apply one change. Switching to a game with odds creates its odds row with
    /// `default_odds` when none exists yet.
    async fn update_group(
        &self,
        group: &GroupId,
        update: GroupUpdate,
        default_odds: QuickThereConfig,
    ) -> Result<()>;

    /// Returns the number of groups whose status changed.
    async fn update_group_status_by_tg_chat_id(
        &self,
        tg_chat_id: i64,
        status: ChatGroupStatus,
    ) -> Result<u64>;

    /// Insert `group`, or refresh title and status of the row with the same Telegram chat id,
    /// and link `admin` to it. Returns the stored row.
    async fn register_group(&self, group: NewChatGroup, admin: UserId) -> Result<ChatGroup>;
}

#[derive(Default)]
struct MemoryState {
    groups: Vec<ChatGroup>,
    admins: Vec<AdminLink>,
    members: Vec<(UserId, GroupId)>,
    odds: Vec<(GroupId, QuickThereConfig)>,
}

/// In-memory store with insertion-ordered tables. Counts writes so tests can assert none
/// happened.
#[derive(Default)]
pub struct MemoryGroupStore {
    state: Mutex<MemoryState>,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_group(&self, group: ChatGroup) {
        self.state.lock().await.groups.push(group);
    }

    pub async fn add_admin(&self, group: &GroupId, admin: UserId) {
        self.state.lock().await.admins.push(AdminLink {
            group_id: group.clone(),
            admin,
        });
    }

    pub async fn add_member(&self, user: UserId, group: &GroupId) {
        self.state.lock().await.members.push((user, group.clone()));
    }

    pub async fn set_quick_there_config(&self, group: &GroupId, config: QuickThereConfig) {
        let mut state = self.state.lock().await;
        state.odds.retain(|(g, _)| g != group);
        state.odds.push((group.clone(), config));
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    fn check_up(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("memory store marked down".to_string()));
        }
        Ok(())
    }
}

fn odds_entry<'a>(
    odds: &'a mut Vec<(GroupId, QuickThereConfig)>,
    group: &GroupId,
    default_odds: QuickThereConfig,
) -> &'a mut QuickThereConfig {
    let idx = match odds.iter().position(|(g, _)| g == group) {
        Some(idx) => idx,
        None => {
            odds.push((group.clone(), default_odds));
            odds.len() - 1
        }
    };
    &mut odds[idx].1
}

#[async_trait]
impl GroupStore for MemoryGroupStore {
    async fn query_group_by_id(&self, id: &GroupId) -> Result<Option<ChatGroup>> {
        self.check_up()?;
        let state = self.state.lock().await;
        Ok(state.groups.iter().find(|g| &g.id == id).cloned())
    }

    async fn query_groups_by_ids(&self, ids: &[GroupId]) -> Result<Vec<ChatGroup>> {
        self.check_up()?;
        let state = self.state.lock().await;
        Ok(state
            .groups
            .iter()
            .filter(|g| ids.contains(&g.id))
            .cloned()
            .collect())
    }

    async fn list_admin_links_by_user(&self, admin: UserId) -> Result<Vec<AdminLink>> {
        self.check_up()?;
        let state = self.state.lock().await;
        Ok(state
            .admins
            .iter()
            .filter(|l| l.admin == admin)
            .cloned()
            .collect())
    }

    async fn query_admin_link(
        &self,
        group: &GroupId,
        admin: UserId,
    ) -> Result<Option<AdminLink>> {
        self.check_up()?;
        let state = self.state.lock().await;
        Ok(state
            .admins
            .iter()
            .find(|l| &l.group_id == group && l.admin == admin)
            .cloned())
    }

    async fn list_joined_group_ids(&self, user: UserId) -> Result<Vec<GroupId>> {
        self.check_up()?;
        let state = self.state.lock().await;
        Ok(state
            .members
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, g)| g.clone())
            .collect())
    }

    async fn query_quick_there_config(&self, group: &GroupId) -> Result<Option<QuickThereConfig>> {
        self.check_up()?;
        let state = self.state.lock().await;
        Ok(state
            .odds
            .iter()
            .find(|(g, _)| g == group)
            .map(|(_, c)| *c))
    }

    async fn update_group(
        &self,
        group: &GroupId,
        update: GroupUpdate,
        default_odds: QuickThereConfig,
    ) -> Result<()> {
        self.check_up()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        let MemoryState { groups, odds, .. } = &mut *state;

        let row = groups
            .iter_mut()
            .find(|g| &g.id == group)
            .ok_or_else(|| Error::NotFound(format!("group {group}")))?;

        match update {
            GroupUpdate::GameplayType(t) => {
                row.gameplay_type = t;
                if t.has_odds() {
                    odds_entry(odds, group, default_odds);
                }
            }
            GroupUpdate::GameplayStatus(s) => row.gameplay_status = s,
            GroupUpdate::DrawCycle(minutes) => row.draw_cycle = minutes,
            GroupUpdate::SimpleOdds(v) => odds_entry(odds, group, default_odds).simple_odds = v,
            GroupUpdate::TripletOdds(v) => odds_entry(odds, group, default_odds).triplet_odds = v,
        }
        Ok(())
    }

    async fn update_group_status_by_tg_chat_id(
        &self,
        tg_chat_id: i64,
        status: ChatGroupStatus,
    ) -> Result<u64> {
        self.check_up()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        let mut changed = 0;
        for g in state
            .groups
            .iter_mut()
            .filter(|g| g.tg_chat_id == tg_chat_id && g.status != status)
        {
            g.status = status;
            changed += 1;
        }
        Ok(changed)
    }

    async fn register_group(&self, group: NewChatGroup, admin: UserId) -> Result<ChatGroup> {
        self.check_up()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;

        let stored = match state
            .groups
            .iter_mut()
            .find(|g| g.tg_chat_id == group.tg_chat_id)
        {
            Some(existing) => {
                existing.title = group.title.clone();
                existing.status = ChatGroupStatus::Normal;
                existing.clone()
            }
            None => {
                let row = ChatGroup {
                    id: group.id.clone(),
                    tg_chat_id: group.tg_chat_id,
                    title: group.title.clone(),
                    gameplay_type: group.gameplay_type,
                    gameplay_status: GameplayStatus::Off,
                    draw_cycle: group.draw_cycle,
                    status: ChatGroupStatus::Normal,
                };
                state.groups.push(row.clone());
                if group.gameplay_type.has_odds() {
                    state.odds.push((row.id.clone(), group.odds));
                }
                row
            }
        };

        if !state
            .admins
            .iter()
            .any(|l| l.group_id == stored.id && l.admin == admin)
        {
            state.admins.push(AdminLink {
                group_id: stored.id.clone(),
                admin,
            });
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ODDS: QuickThereConfig = QuickThereConfig {
        simple_odds: 2.0,
        triplet_odds: 30.0,
    };

    fn group(id: &str, tg: i64, t: GameplayType) -> ChatGroup {
        ChatGroup {
            id: GroupId(id.to_string()),
            tg_chat_id: tg,
            title: format!("group {id}"),
            gameplay_type: t,
            gameplay_status: GameplayStatus::Off,
            draw_cycle: 5,
            status: ChatGroupStatus::Normal,
        }
    }

    #[tokio::test]
    async fn switching_to_quick_there_creates_default_odds() {
        let store = MemoryGroupStore::new();
        store.insert_group(group("g1", -100, GameplayType::BigSmall)).await;
        let id = GroupId("g1".to_string());

        store
            .update_group(&id, GroupUpdate::GameplayType(GameplayType::QuickThere), ODDS)
            .await
            .unwrap();

        assert_eq!(store.query_quick_there_config(&id).await.unwrap(), Some(ODDS));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn register_is_idempotent_per_telegram_chat() {
        let store = MemoryGroupStore::new();
        let new = |id: &str, title: &str| NewChatGroup {
            id: GroupId(id.to_string()),
            tg_chat_id: -42,
            title: title.to_string(),
            gameplay_type: GameplayType::QuickThere,
            draw_cycle: 5,
            odds: ODDS,
        };

        let first = store.register_group(new("a", "Dice"), UserId(1)).await.unwrap();
        store
            .update_group_status_by_tg_chat_id(-42, ChatGroupStatus::Kicked)
            .await
            .unwrap();
        let second = store.register_group(new("b", "Dice 2"), UserId(1)).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.title, "Dice 2");
        assert_eq!(second.status, ChatGroupStatus::Normal);
        assert_eq!(store.list_admin_links_by_user(UserId(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn down_store_reports_unavailable() {
        let store = MemoryGroupStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.query_group_by_id(&GroupId("x".to_string())).await,
            Err(Error::Unavailable(_))
        ));
    }
}
