use std::sync::Arc;

use teloxide::{
    dispatching::Dispatcher,
    dptree,
    prelude::*,
    types::BotCommand,
};

use tdb_core::{
    config::Config, groups::GroupRegistrar, menu::MenuEngine, messaging::port::MessagingPort,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub engine: Arc<MenuEngine>,
    pub registrar: Arc<GroupRegistrar>,
    pub messenger: Arc<dyn MessagingPort>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    engine: Arc<MenuEngine>,
    registrar: Arc<GroupRegistrar>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "dice bot started"),
        Err(e) => tracing::warn!(error = %e, "get_me failed, continuing"),
    }

    let commands = vec![
        BotCommand::new("start", "Open the menu, or register this group"),
        BotCommand::new("help", "How to use the bot"),
    ];
    if let Err(e) = bot.set_my_commands(commands).await {
        tracing::warn!(error = %e, "could not publish bot commands");
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let state = Arc::new(AppState {
        cfg,
        engine,
        registrar,
        messenger,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("dispatcher stopped");
    Ok(())
}
