//! Callback token store and private-chat session cache.
//!
//! Both live on a [`KvBackend`] under fixed key namespaces:
//! - `BUTTON_CALLBACK_DATA:<token>` → JSON string map, one hour
//! - `BOT_PRIVATE_CHAT_CACHE:TG_USER_ID:<userId>` → JSON session payload, one day

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{ConfigField, GroupId, UserId},
    errors::Error,
    ids::{to_base36, IdGenerator},
    kv::KvBackend,
    params::{decode_bag, encode_bag, ParameterBag},
    Result,
};

pub const BUTTON_CALLBACK_DATA_PREFIX: &str = "BUTTON_CALLBACK_DATA:";
pub const PRIVATE_CHAT_CACHE_PREFIX: &str = "BOT_PRIVATE_CHAT_CACHE:TG_USER_ID:";

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(86_400);

/// Opaque reference to one stored parameter bag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Token(pub String);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Write-once store of parameter bags. Entries disappear only through expiry.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn put(&self, bag: &ParameterBag) -> Result<Token>;

    /// Fails with [`Error::TokenNotFound`] for unknown or expired tokens; never returns an
    /// empty bag in their place.
    async fn resolve(&self, token: &Token) -> Result<ParameterBag>;
}

/// What the bot is waiting for in a user's private chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingDrawCycle,
    AwaitingSimpleOdds,
    AwaitingTripletOdds,
}

impl SessionState {
    pub fn awaiting(field: ConfigField) -> Self {
        match field {
            ConfigField::DrawCycle => SessionState::AwaitingDrawCycle,
            ConfigField::SimpleOdds => SessionState::AwaitingSimpleOdds,
            ConfigField::TripletOdds => SessionState::AwaitingTripletOdds,
        }
    }

    pub fn field(self) -> Option<ConfigField> {
        match self {
            SessionState::Idle => None,
            SessionState::AwaitingDrawCycle => Some(ConfigField::DrawCycle),
            SessionState::AwaitingSimpleOdds => Some(ConfigField::SimpleOdds),
            SessionState::AwaitingTripletOdds => Some(ConfigField::TripletOdds),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateChatSession {
    pub state: SessionState,
    pub chat_group_id: Option<String>,
}

impl PrivateChatSession {
    pub fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            chat_group_id: None,
        }
    }

    pub fn awaiting(field: ConfigField, group_id: &GroupId) -> Self {
        Self {
            state: SessionState::awaiting(field),
            chat_group_id: Some(group_id.0.clone()),
        }
    }

    /// The pending edit, if the session is waiting for one.
    pub fn pending_edit(&self) -> Option<(ConfigField, GroupId)> {
        let field = self.state.field()?;
        let group = self.chat_group_id.as_ref()?;
        Some((field, GroupId(group.clone())))
    }
}

/// One session per user, overwritten on every save.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn save(&self, user_id: UserId, session: &PrivateChatSession) -> Result<()>;
    async fn load(&self, user_id: UserId) -> Result<Option<PrivateChatSession>>;
}

pub struct KvTokenStore {
    backend: Arc<dyn KvBackend>,
    ids: Arc<dyn IdGenerator>,
    ttl: Duration,
}

impl KvTokenStore {
    pub fn new(backend: Arc<dyn KvBackend>, ids: Arc<dyn IdGenerator>, ttl: Duration) -> Self {
        Self { backend, ids, ttl }
    }

    fn key(token: &Token) -> String {
        format!("{BUTTON_CALLBACK_DATA_PREFIX}{token}")
    }
}

#[async_trait]
impl TokenStore for KvTokenStore {
    async fn put(&self, bag: &ParameterBag) -> Result<Token> {
        let value = encode_bag(bag)?;
        let token = Token(to_base36(self.ids.next_id()?));
        self.backend
            .set_ex(&Self::key(&token), &value, self.ttl)
            .await?;
        Ok(token)
    }

    async fn resolve(&self, token: &Token) -> Result<ParameterBag> {
        let key = Self::key(token);
        match self.backend.get(&key).await? {
            Some(raw) => decode_bag(&raw),
            None => {
                tracing::debug!(%key, "callback token missing or expired");
                Err(Error::TokenNotFound(token.0.clone()))
            }
        }
    }
}

pub struct KvSessionCache {
    backend: Arc<dyn KvBackend>,
    ttl: Duration,
}

impl KvSessionCache {
    pub fn new(backend: Arc<dyn KvBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    fn key(user_id: UserId) -> String {
        format!("{PRIVATE_CHAT_CACHE_PREFIX}{}", user_id.0)
    }
}

#[async_trait]
impl SessionCache for KvSessionCache {
    async fn save(&self, user_id: UserId, session: &PrivateChatSession) -> Result<()> {
        let value = serde_json::to_string(session).map_err(|e| Error::Encoding(e.to_string()))?;
        self.backend
            .set_ex(&Self::key(user_id), &value, self.ttl)
            .await
    }

    async fn load(&self, user_id: UserId) -> Result<Option<PrivateChatSession>> {
        let Some(raw) = self.backend.get(&Self::key(user_id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| Error::Decoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::{ids::SnowflakeIdGenerator, kv::MemoryKv};

    struct FailingIds;

    impl IdGenerator for FailingIds {
        fn next_id(&self) -> Result<u64> {
            Err(Error::IdGeneration("clock moved backwards by 3ms".to_string()))
        }
    }

    /// Sequential ids, so tests can name keys.
    #[derive(Default)]
    struct CountingIds(AtomicU64);

    impl IdGenerator for CountingIds {
        fn next_id(&self) -> Result<u64> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    fn bag(pairs: &[(&str, &str)]) -> ParameterBag {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn store(kv: Arc<MemoryKv>) -> KvTokenStore {
        KvTokenStore::new(
            kv,
            Arc::new(SnowflakeIdGenerator::new(1).unwrap()),
            DEFAULT_TOKEN_TTL,
        )
    }

    #[tokio::test]
    async fn resolve_returns_the_bag_exactly_as_stored() {
        let s = store(Arc::new(MemoryKv::new()));
        let b = bag(&[("chatGroupId", "g-1"), ("gameplayType", "quick_there")]);
        let t = s.put(&b).await.unwrap();
        assert_eq!(s.resolve(&t).await.unwrap(), b);
        // Not single-use.
        assert_eq!(s.resolve(&t).await.unwrap(), b);
    }

    #[tokio::test]
    async fn identical_bags_get_distinct_tokens() {
        let s = store(Arc::new(MemoryKv::new()));
        let b = bag(&[("chatGroupId", "g-1")]);
        let t1 = s.put(&b).await.unwrap();
        let t2 = s.put(&b).await.unwrap();
        assert_ne!(t1, t2);
        assert_eq!(s.resolve(&t1).await.unwrap(), b);
        assert_eq!(s.resolve(&t2).await.unwrap(), b);
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_expire_after_one_hour() {
        let s = store(Arc::new(MemoryKv::new()));
        let t = s.put(&bag(&[("chatGroupId", "g-1")])).await.unwrap();

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert!(s.resolve(&t).await.is_ok());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(matches!(s.resolve(&t).await, Err(Error::TokenNotFound(_))));
    }

    #[tokio::test]
    async fn unknown_token_is_not_found_not_empty() {
        let s = store(Arc::new(MemoryKv::new()));
        let err = s.resolve(&Token("nope".to_string())).await.unwrap_err();
        assert!(matches!(err, Error::TokenNotFound(t) if t == "nope"));
    }

    #[tokio::test]
    async fn corrupt_value_is_a_decoding_error() {
        let kv = Arc::new(MemoryKv::new());
        let s = KvTokenStore::new(kv.clone(), Arc::new(CountingIds::default()), DEFAULT_TOKEN_TTL);
        let t = s.put(&bag(&[("chatGroupId", "g-1")])).await.unwrap();
        assert_eq!(t.0, "1");
        kv.corrupt("BUTTON_CALLBACK_DATA:1", "not-json").await;
        assert!(matches!(s.resolve(&t).await, Err(Error::Decoding(_))));
    }

    #[tokio::test]
    async fn id_failure_stores_nothing() {
        let kv = Arc::new(MemoryKv::new());
        let s = KvTokenStore::new(kv.clone(), Arc::new(FailingIds), DEFAULT_TOKEN_TTL);
        let err = s.put(&bag(&[("chatGroupId", "g-1")])).await.unwrap_err();
        assert!(matches!(err, Error::IdGeneration(_)));
        assert!(kv.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn session_is_overwritten_and_expires_after_a_day() {
        let kv = Arc::new(MemoryKv::new());
        let cache = KvSessionCache::new(kv.clone(), DEFAULT_SESSION_TTL);
        let user = UserId(99);
        let group = GroupId("g-1".to_string());

        cache
            .save(user, &PrivateChatSession::awaiting(ConfigField::DrawCycle, &group))
            .await
            .unwrap();
        cache
            .save(user, &PrivateChatSession::awaiting(ConfigField::SimpleOdds, &group))
            .await
            .unwrap();
        assert_eq!(kv.len().await, 1);

        let loaded = cache.load(user).await.unwrap().unwrap();
        assert_eq!(
            loaded.pending_edit(),
            Some((ConfigField::SimpleOdds, group.clone()))
        );

        tokio::time::advance(DEFAULT_SESSION_TTL).await;
        assert_eq!(cache.load(user).await.unwrap(), None);
    }

    #[tokio::test]
    async fn session_payload_uses_camel_case_keys() {
        let kv = Arc::new(MemoryKv::new());
        let cache = KvSessionCache::new(kv.clone(), DEFAULT_SESSION_TTL);
        cache
            .save(
                UserId(7),
                &PrivateChatSession::awaiting(ConfigField::TripletOdds, &GroupId("g".to_string())),
            )
            .await
            .unwrap();
        let raw = kv
            .get("BOT_PRIVATE_CHAT_CACHE:TG_USER_ID:7")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            raw,
            r#"{"state":"awaiting_triplet_odds","chatGroupId":"g"}"#
        );
    }
}
