//! PostgreSQL implementation of the group store.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, Transaction};
use tdb_core::{
    domain::{
        AdminLink, ChatGroup, ChatGroupStatus, GameplayStatus, GameplayType, GroupId,
        QuickThereConfig, UserId,
    },
    store::{GroupStore, GroupUpdate, NewChatGroup},
    Error, Result,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chat_group (
    id               TEXT PRIMARY KEY,
    tg_chat_id       BIGINT NOT NULL UNIQUE,
    title            TEXT NOT NULL,
    gameplay_type    TEXT NOT NULL,
    gameplay_status  TEXT NOT NULL DEFAULT 'off',
    draw_cycle       INT NOT NULL,
    status           TEXT NOT NULL DEFAULT 'normal',
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE TABLE IF NOT EXISTS chat_group_admin (
    chat_group_id  TEXT NOT NULL REFERENCES chat_group(id),
    tg_user_id     BIGINT NOT NULL,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (chat_group_id, tg_user_id)
);
CREATE TABLE IF NOT EXISTS chat_group_user (
    chat_group_id  TEXT NOT NULL REFERENCES chat_group(id),
    tg_user_id     BIGINT NOT NULL,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (chat_group_id, tg_user_id)
);
CREATE TABLE IF NOT EXISTS quick_there_config (
    chat_group_id  TEXT PRIMARY KEY REFERENCES chat_group(id),
    simple_odds    DOUBLE PRECISION NOT NULL,
    triplet_odds   DOUBLE PRECISION NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chat_group_admin_user ON chat_group_admin(tg_user_id);
CREATE INDEX IF NOT EXISTS idx_chat_group_user_user ON chat_group_user(tg_user_id);
"#;

const GROUP_COLUMNS: &str =
    "id, tg_chat_id, title, gameplay_type, gameplay_status, draw_cycle, status";

#[derive(Debug, Clone, FromRow)]
struct ChatGroupRow {
    id: String,
    tg_chat_id: i64,
    title: String,
    gameplay_type: String,
    gameplay_status: String,
    draw_cycle: i32,
    status: String,
}

impl TryFrom<ChatGroupRow> for ChatGroup {
    type Error = Error;

    fn try_from(row: ChatGroupRow) -> Result<Self> {
        let bad = |column: &str, value: &str| {
            Error::Decoding(format!("chat_group {}: bad {column} {value:?}", row.id))
        };
        let gameplay_type = GameplayType::parse(&row.gameplay_type)
            .ok_or_else(|| bad("gameplay_type", &row.gameplay_type))?;
        let gameplay_status = GameplayStatus::parse(&row.gameplay_status)
            .ok_or_else(|| bad("gameplay_status", &row.gameplay_status))?;
        let status =
            ChatGroupStatus::parse(&row.status).ok_or_else(|| bad("status", &row.status))?;
        let draw_cycle = u32::try_from(row.draw_cycle)
            .map_err(|_| bad("draw_cycle", &row.draw_cycle.to_string()))?;

        Ok(ChatGroup {
            id: GroupId(row.id),
            tg_chat_id: row.tg_chat_id,
            title: row.title,
            gameplay_type,
            gameplay_status,
            draw_cycle,
            status,
        })
    }
}

#[derive(Debug, Clone, Copy, FromRow)]
struct OddsRow {
    simple_odds: f64,
    triplet_odds: f64,
}

pub struct PgGroupStore {
    pool: PgPool,
}

impl PgGroupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| Error::Unavailable(format!("database connection failed: {e}")))?;
        Ok(Self { pool })
    }

    /// Create the tables when they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| unavailable("schema migration", e))?;
        Ok(())
    }

    async fn group_exists(tx: &mut Transaction<'_, Postgres>, group: &GroupId) -> Result<bool> {
        let found: Option<(String,)> =
            sqlx::query_as("SELECT id FROM chat_group WHERE id = $1 FOR UPDATE")
                .bind(&group.0)
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| unavailable("lock group", e))?;
        Ok(found.is_some())
    }

    async fn ensure_odds(
        tx: &mut Transaction<'_, Postgres>,
        group: &GroupId,
        default_odds: QuickThereConfig,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO quick_there_config (chat_group_id, simple_odds, triplet_odds)
            VALUES ($1, $2, $3)
            ON CONFLICT (chat_group_id) DO NOTHING
            "#,
        )
        .bind(&group.0)
        .bind(default_odds.simple_odds)
        .bind(default_odds.triplet_odds)
        .execute(&mut **tx)
        .await
        .map_err(|e| unavailable("create odds", e))?;
        Ok(())
    }
}

fn unavailable(what: &str, e: sqlx::Error) -> Error {
    Error::Unavailable(format!("{what} failed: {e}"))
}

#[async_trait]
impl GroupStore for PgGroupStore {
    async fn query_group_by_id(&self, id: &GroupId) -> Result<Option<ChatGroup>> {
        let row: Option<ChatGroupRow> =
            sqlx::query_as(&format!("SELECT {GROUP_COLUMNS} FROM chat_group WHERE id = $1"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| unavailable("fetch group", e))?;
        row.map(ChatGroup::try_from).transpose()
    }

    async fn query_groups_by_ids(&self, ids: &[GroupId]) -> Result<Vec<ChatGroup>> {
        let ids: Vec<&str> = ids.iter().map(|id| id.0.as_str()).collect();
        let rows: Vec<ChatGroupRow> = sqlx::query_as(&format!(
            "SELECT {GROUP_COLUMNS} FROM chat_group WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable("fetch groups", e))?;
        rows.into_iter().map(ChatGroup::try_from).collect()
    }

    async fn list_admin_links_by_user(&self, admin: UserId) -> Result<Vec<AdminLink>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT chat_group_id FROM chat_group_admin
            WHERE tg_user_id = $1
            ORDER BY created_at ASC, chat_group_id ASC
            "#,
        )
        .bind(admin.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable("list admin links", e))?;
        Ok(rows
            .into_iter()
            .map(|(group_id,)| AdminLink {
                group_id: GroupId(group_id),
                admin,
            })
            .collect())
    }

    async fn query_admin_link(
        &self,
        group: &GroupId,
        admin: UserId,
    ) -> Result<Option<AdminLink>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT chat_group_id FROM chat_group_admin WHERE chat_group_id = $1 AND tg_user_id = $2",
        )
        .bind(&group.0)
        .bind(admin.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unavailable("fetch admin link", e))?;
        Ok(row.map(|(group_id,)| AdminLink {
            group_id: GroupId(group_id),
            admin,
        }))
    }

    async fn list_joined_group_ids(&self, user: UserId) -> Result<Vec<GroupId>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT chat_group_id FROM chat_group_user
            WHERE tg_user_id = $1
            ORDER BY created_at ASC, chat_group_id ASC
            "#,
        )
        .bind(user.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable("list joined groups", e))?;
        Ok(rows.into_iter().map(|(id,)| GroupId(id)).collect())
    }

    async fn query_quick_there_config(&self, group: &GroupId) -> Result<Option<QuickThereConfig>> {
        let row: Option<OddsRow> = sqlx::query_as(
            "SELECT simple_odds, triplet_odds FROM quick_there_config WHERE chat_group_id = $1",
        )
        .bind(&group.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unavailable("fetch odds", e))?;
        Ok(row.map(|r| QuickThereConfig {
            simple_odds: r.simple_odds,
            triplet_odds: r.triplet_odds,
        }))
    }

    async fn update_group(
        &self,
        group: &GroupId,
        update: GroupUpdate,
        default_odds: QuickThereConfig,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| unavailable("begin", e))?;
        if !Self::group_exists(&mut tx, group).await? {
            return Err(Error::NotFound(format!("group {group}")));
        }

        let done = match update {
            GroupUpdate::GameplayType(t) => {
                if t.has_odds() {
                    Self::ensure_odds(&mut tx, group, default_odds).await?;
                }
                sqlx::query("UPDATE chat_group SET gameplay_type = $2 WHERE id = $1")
                    .bind(&group.0)
                    .bind(t.as_str())
                    .execute(&mut *tx)
                    .await
            }
            GroupUpdate::GameplayStatus(s) => {
                sqlx::query("UPDATE chat_group SET gameplay_status = $2 WHERE id = $1")
                    .bind(&group.0)
                    .bind(s.as_str())
                    .execute(&mut *tx)
                    .await
            }
            GroupUpdate::DrawCycle(minutes) => {
                let minutes = i32::try_from(minutes)
                    .map_err(|_| Error::InvalidInput(format!("draw cycle {minutes} too large")))?;
                sqlx::query("UPDATE chat_group SET draw_cycle = $2 WHERE id = $1")
                    .bind(&group.0)
                    .bind(minutes)
                    .execute(&mut *tx)
                    .await
            }
            GroupUpdate::SimpleOdds(v) => {
                Self::ensure_odds(&mut tx, group, default_odds).await?;
                sqlx::query(
                    "UPDATE quick_there_config SET simple_odds = $2 WHERE chat_group_id = $1",
                )
                .bind(&group.0)
                .bind(v)
                .execute(&mut *tx)
                .await
            }
            GroupUpdate::TripletOdds(v) => {
                Self::ensure_odds(&mut tx, group, default_odds).await?;
                sqlx::query(
                    "UPDATE quick_there_config SET triplet_odds = $2 WHERE chat_group_id = $1",
                )
                .bind(&group.0)
                .bind(v)
                .execute(&mut *tx)
                .await
            }
        };
        done.map_err(|e| unavailable("update group", e))?;

        tx.commit().await.map_err(|e| unavailable("commit", e))?;
        tracing::debug!(group = %group, ?update, "group updated");
        Ok(())
    }

    async fn update_group_status_by_tg_chat_id(
        &self,
        tg_chat_id: i64,
        status: ChatGroupStatus,
    ) -> Result<u64> {
        let done = sqlx::query(
            "UPDATE chat_group SET status = $2 WHERE tg_chat_id = $1 AND status <> $2",
        )
        .bind(tg_chat_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| unavailable("update group status", e))?;
        Ok(done.rows_affected())
    }

    async fn register_group(&self, group: NewChatGroup, admin: UserId) -> Result<ChatGroup> {
        let draw_cycle = i32::try_from(group.draw_cycle)
            .map_err(|_| Error::InvalidInput(format!("draw cycle {} too large", group.draw_cycle)))?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| unavailable("begin", e))?;

        let row: ChatGroupRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO chat_group (id, tg_chat_id, title, gameplay_type, gameplay_status, draw_cycle, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (tg_chat_id)
            DO UPDATE SET title = EXCLUDED.title, status = EXCLUDED.status
            RETURNING {GROUP_COLUMNS}
            "#
        ))
        .bind(&group.id.0)
        .bind(group.tg_chat_id)
        .bind(&group.title)
        .bind(group.gameplay_type.as_str())
        .bind(GameplayStatus::Off.as_str())
        .bind(draw_cycle)
        .bind(ChatGroupStatus::Normal.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unavailable("register group", e))?;
        let stored = ChatGroup::try_from(row)?;

        // Only a freshly inserted row gets the default odds.
        if stored.id == group.id && stored.gameplay_type.has_odds() {
            Self::ensure_odds(&mut tx, &stored.id, group.odds).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO chat_group_admin (chat_group_id, tg_user_id)
            VALUES ($1, $2)
            ON CONFLICT (chat_group_id, tg_user_id) DO NOTHING
            "#,
        )
        .bind(&stored.id.0)
        .bind(admin.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| unavailable("link admin", e))?;

        tx.commit().await.map_err(|e| unavailable("commit", e))?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ChatGroupRow {
        ChatGroupRow {
            id: "123".to_string(),
            tg_chat_id: -1001,
            title: "Dice".to_string(),
            gameplay_type: "quick_there".to_string(),
            gameplay_status: "on".to_string(),
            draw_cycle: 5,
            status: "normal".to_string(),
        }
    }

    #[test]
    fn row_converts_to_domain_group() {
        let group = ChatGroup::try_from(row()).unwrap();
        assert_eq!(group.id, GroupId("123".to_string()));
        assert_eq!(group.gameplay_type, GameplayType::QuickThere);
        assert_eq!(group.gameplay_status, GameplayStatus::On);
        assert_eq!(group.status, ChatGroupStatus::Normal);
    }

    #[test]
    fn unknown_enum_text_is_a_decoding_error() {
        let mut bad = row();
        bad.gameplay_type = "roulette".to_string();
        assert!(matches!(ChatGroup::try_from(bad), Err(Error::Decoding(_))));

        let mut negative = row();
        negative.draw_cycle = -1;
        assert!(matches!(ChatGroup::try_from(negative), Err(Error::Decoding(_))));
    }

    #[test]
    fn schema_creates_every_table() {
        for table in ["chat_group", "chat_group_admin", "chat_group_user", "quick_there_config"] {
            assert!(SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")));
        }
    }
}
