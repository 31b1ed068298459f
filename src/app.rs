use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use teloxide::dispatching::UpdateHandler;
use teloxide::dptree;
use teloxide::prelude::*;
use tokio::task::JoinHandle;
use tracing::info;

use crate::bot;
use crate::bot::AppContext;
use crate::bot::CommandDispatcher;
use crate::bot::commands;
use crate::bot::messenger::TelegramMessenger;
use crate::bot::registry::CommandRegistry;
use crate::config::Config;
use crate::db::Db;
use crate::dictionary::DictionaryClient;

/// Upper bound on how long an expired session can linger before the sweeper notices.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct App {
  bot: Bot,
  context: Arc<AppContext>,
  dispatcher: Arc<CommandDispatcher>,
  handler: UpdateHandler<anyhow::Error>,
}

impl App {
  pub fn new(bot: Bot, db: Db, config: Config) -> anyhow::Result<Self> {
    let mut registry = CommandRegistry::new();
    commands::register_all(&mut registry).context("failed to register commands")?;
    let registry = Arc::new(registry);
    info!(commands = registry.len(), "command registry ready");

    let dictionary = DictionaryClient::new(&config.dictionary_url).context("failed to build dictionary client")?;
    let dispatcher = Arc::new(CommandDispatcher::new(registry.clone(), config.prefix.clone()));
    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));
    let context = Arc::new(AppContext::new(config, Arc::new(db), messenger, dictionary, registry));
    let handler = bot::build_schema();
    Ok(Self {
      bot,
      context,
      dispatcher,
      handler,
    })
  }

  pub async fn run(self) -> anyhow::Result<()> {
    let sweeper = spawn_session_sweeper(self.context.clone());

    Dispatcher::builder(self.bot.clone(), self.handler)
      .dependencies(dptree::deps![self.context.clone(), self.dispatcher.clone()])
      .enable_ctrlc_handler()
      .build()
      .dispatch()
      .await;

    if let Some(sweeper) = sweeper {
      sweeper.abort();
    }
    info!("bot stopped");
    Ok(())
  }
}

fn spawn_session_sweeper(context: Arc<AppContext>) -> Option<JoinHandle<()>> {
  let idle_secs = context.config().session_idle_secs;
  if idle_secs == 0 {
    info!("idle wizard sessions never expire");
    return None;
  }

  let max_idle = i64::try_from(idle_secs)
    .ok()
    .and_then(chrono::Duration::try_seconds)
    .unwrap_or(chrono::Duration::MAX);
  let period = Duration::from_secs(idle_secs).min(MAX_SWEEP_INTERVAL);
  info!(idle_secs, sweep_secs = period.as_secs(), "starting wizard session sweeper");

  Some(tokio::spawn(async move {
    let mut ticker = tokio::time::interval(period);
    loop {
      ticker.tick().await;
      let expired = context.wizard().expire_idle(max_idle).await;
      if expired > 0 {
        let remaining = context.wizard().sessions().len().await;
        info!(expired, remaining, "expired idle wizard sessions");
      }
    }
  }))
}
