use std::sync::Arc;

use tdb_core::{
    config::Config,
    groups::GroupRegistrar,
    ids::SnowflakeIdGenerator,
    menu::MenuEngine,
    tokens::{KvSessionCache, KvTokenStore},
};
use tdb_redis::RedisKv;
use tdb_sql::PgGroupStore;

#[tokio::main]
async fn main() -> Result<(), tdb_core::Error> {
    tdb_core::logging::init("tdb")?;

    let cfg = Arc::new(Config::load()?);

    let kv = Arc::new(RedisKv::connect(&cfg.redis_url).await?);
    let store = Arc::new(PgGroupStore::connect(&cfg.database_url).await?);
    store.ensure_schema().await?;
    let ids = Arc::new(SnowflakeIdGenerator::new(cfg.id_machine_id)?);

    let engine = Arc::new(MenuEngine::new(
        Arc::new(KvTokenStore::new(kv.clone(), ids.clone(), cfg.callback_token_ttl)),
        Arc::new(KvSessionCache::new(kv, cfg.private_chat_cache_ttl)),
        store.clone(),
        cfg.menu_settings(),
    ));
    let registrar = Arc::new(GroupRegistrar::new(store, ids, cfg.group_defaults()));

    tracing::info!(machine_id = cfg.id_machine_id, "storage ready");

    tdb_telegram::router::run_polling(cfg, engine, registrar)
        .await
        .map_err(|e| tdb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
