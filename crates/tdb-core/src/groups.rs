//! Group lifecycle outside the menus: registration from inside a group and reacting to the
//! bot losing access to one.

use std::sync::Arc;

use crate::{
    domain::{ChatGroup, ChatGroupStatus, GameplayType, GroupId, QuickThereConfig, UserId},
    errors::Error,
    ids::IdGenerator,
    messaging::types::{ChatMemberRole, DeliveryFailure},
    store::{GroupStore, NewChatGroup},
    Result,
};

/// Configuration given to a group the first time it is registered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroupDefaults {
    pub gameplay_type: GameplayType,
    pub draw_cycle: u32,
    pub odds: QuickThereConfig,
}

impl Default for GroupDefaults {
    fn default() -> Self {
        Self {
            gameplay_type: GameplayType::QuickThere,
            draw_cycle: 5,
            odds: QuickThereConfig {
                simple_odds: 2.0,
                triplet_odds: 30.0,
            },
        }
    }
}

pub struct GroupRegistrar {
    store: Arc<dyn GroupStore>,
    ids: Arc<dyn IdGenerator>,
    defaults: GroupDefaults,
}

impl GroupRegistrar {
    pub fn new(
        store: Arc<dyn GroupStore>,
        ids: Arc<dyn IdGenerator>,
        defaults: GroupDefaults,
    ) -> Self {
        Self {
            store,
            ids,
            defaults,
        }
    }

    /// Register the Telegram group `tg_chat_id` and make `user` one of its admins.
    ///
    /// `role` is the user's membership in that chat; only owners and administrators may
    /// register. Re-registering a known chat refreshes its title and clears a kicked status.
    pub async fn register(
        &self,
        tg_chat_id: i64,
        title: &str,
        user: UserId,
        role: ChatMemberRole,
    ) -> Result<ChatGroup> {
        if !role.is_privileged() {
            return Err(Error::Unauthorized {
                user_id: user.0,
                group: tg_chat_id.to_string(),
            });
        }

        let id = GroupId(self.ids.next_id()?.to_string());
        let group = self
            .store
            .register_group(
                NewChatGroup {
                    id,
                    tg_chat_id,
                    title: title.to_string(),
                    gameplay_type: self.defaults.gameplay_type,
                    draw_cycle: self.defaults.draw_cycle,
                    odds: self.defaults.odds,
                },
                user,
            )
            .await?;
        tracing::info!(group = %group.id, tg_chat_id, user = user.0, "group registered");
        Ok(group)
    }

    /// React to a failed delivery into `tg_chat_id`.
    ///
    /// A kicked bot marks the group as kicked; other recognized failures are only logged.
    /// Returns the classification, or `None` for errors that are not delivery failures.
    pub async fn handle_delivery_failure(
        &self,
        tg_chat_id: i64,
        err: &Error,
    ) -> Result<Option<DeliveryFailure>> {
        let failure = DeliveryFailure::classify(&err.to_string());
        match failure {
            Some(DeliveryFailure::Kicked) => {
                let changed = self
                    .store
                    .update_group_status_by_tg_chat_id(tg_chat_id, ChatGroupStatus::Kicked)
                    .await?;
                tracing::warn!(tg_chat_id, changed, "bot was kicked, group marked");
            }
            Some(DeliveryFailure::Blocked) => {
                tracing::info!(tg_chat_id, "bot was blocked by the user");
            }
            Some(DeliveryFailure::NotModified) => {
                tracing::debug!(tg_chat_id, "message not modified");
            }
            None => {}
        }
        Ok(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ids::SnowflakeIdGenerator, store::MemoryGroupStore};

    fn registrar(store: Arc<MemoryGroupStore>) -> GroupRegistrar {
        GroupRegistrar::new(
            store,
            Arc::new(SnowflakeIdGenerator::new(3).unwrap()),
            GroupDefaults::default(),
        )
    }

    #[tokio::test]
    async fn admin_registers_group_with_defaults() {
        let store = Arc::new(MemoryGroupStore::new());
        let reg = registrar(store.clone());

        let group = reg
            .register(-42, "Dice Night", UserId(7), ChatMemberRole::Administrator)
            .await
            .unwrap();

        assert_eq!(group.gameplay_type, GameplayType::QuickThere);
        assert_eq!(group.draw_cycle, 5);
        assert!(store
            .query_admin_link(&group.id, UserId(7))
            .await
            .unwrap()
            .is_some());
        let odds = store.query_quick_there_config(&group.id).await.unwrap().unwrap();
        assert_eq!(odds.triplet_odds, 30.0);
    }

    #[tokio::test]
    async fn plain_member_cannot_register() {
        let store = Arc::new(MemoryGroupStore::new());
        let reg = registrar(store.clone());

        let err = reg
            .register(-42, "Dice Night", UserId(7), ChatMemberRole::Member)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized { user_id: 7, .. }));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn kicked_delivery_marks_group() {
        let store = Arc::new(MemoryGroupStore::new());
        let reg = registrar(store.clone());
        let group = reg
            .register(-42, "Dice Night", UserId(7), ChatMemberRole::Owner)
            .await
            .unwrap();

        let err = Error::External("Forbidden: bot was kicked from the supergroup chat".into());
        let failure = reg.handle_delivery_failure(-42, &err).await.unwrap();
        assert_eq!(failure, Some(DeliveryFailure::Kicked));

        let stored = store.query_group_by_id(&group.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ChatGroupStatus::Kicked);
    }

    #[tokio::test]
    async fn other_failures_write_nothing() {
        let store = Arc::new(MemoryGroupStore::new());
        let reg = registrar(store.clone());

        let blocked = Error::External("Forbidden: bot was blocked by the user".into());
        assert_eq!(
            reg.handle_delivery_failure(7, &blocked).await.unwrap(),
            Some(DeliveryFailure::Blocked)
        );
        let other = Error::External("connection reset".into());
        assert_eq!(reg.handle_delivery_failure(7, &other).await.unwrap(), None);
        assert_eq!(store.write_count(), 0);
    }
}
