mod app;
mod bot;
mod config;
mod db;
mod dictionary;
mod models;
mod telemetry;
mod util;

use anyhow::Result;
use teloxide::prelude::Bot;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
  dotenvy::dotenv().ok();
  telemetry::init()?;
  let config = config::Config::from_env()?;
  info!(
    admin_count = config.admins.len(),
    prefix = %config.prefix,
    log_chat = config.log_chat.is_some(),
    "starting askeladden"
  );

  let bot = Bot::new(config.bot_token.clone());
  let db = db::Db::connect(&config.database_url).await?;
  let app = app::App::new(bot, db, config)?;
  app.run().await
}
