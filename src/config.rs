use std::env;

use anyhow::Context;
use anyhow::Result;
use teloxide::types::ChatId;

use crate::models::Role;

pub const DEFAULT_PREFIX: &str = "?";
pub const DEFAULT_DICTIONARY_URL: &str = "https://ordbokene.no";
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleConfig {
  pub opplysar: Option<String>,
  pub rettskrivar: Option<String>,
}

impl RoleConfig {
  pub fn role_id(&self, role: Role) -> Option<&str> {
    match role {
      Role::Opplysar => self.opplysar.as_deref(),
      Role::Rettskrivar => self.rettskrivar.as_deref(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RulesConfig {
  pub title: Option<String>,
  pub content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
  pub bot_token: String,
  pub database_url: String,
  pub admins: Vec<i64>,
  pub prefix: String,
  pub log_chat: Option<ChatId>,
  pub approval_queue_chat: Option<ChatId>,
  pub roles: RoleConfig,
  pub rules: RulesConfig,
  pub session_idle_secs: u64,
  pub dictionary_url: String,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    let bot_token = env::var("BOT_TOKEN")
      .or_else(|_| env::var("TELOXIDE_TOKEN"))
      .context("BOT_TOKEN or TELOXIDE_TOKEN must be set")?;
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let admins_raw = env::var("ADMIN_IDS").unwrap_or_default();
    let admins = parse_admins(&admins_raw);
    let prefix = optional_var("COMMAND_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string());
    let log_chat = parse_chat_id("LOG_CHAT_ID")?;
    let approval_queue_chat = parse_chat_id("APPROVAL_QUEUE_CHAT_ID")?;
    let session_idle_secs = match optional_var("SESSION_IDLE_TIMEOUT_SECS") {
      Some(raw) => raw
        .parse::<u64>()
        .context("SESSION_IDLE_TIMEOUT_SECS must be a whole number of seconds")?,
      None => DEFAULT_SESSION_IDLE_SECS,
    };

    Ok(Self {
      bot_token,
      database_url,
      admins,
      prefix,
      log_chat,
      approval_queue_chat,
      roles: RoleConfig {
        opplysar: optional_var("OPPLYSAR_ROLE_ID"),
        rettskrivar: optional_var("RETTSKRIVAR_ROLE_ID"),
      },
      rules: RulesConfig {
        title: optional_var("RULES_TITLE"),
        content: optional_var("RULES_CONTENT"),
      },
      session_idle_secs,
      dictionary_url: optional_var("DICTIONARY_BASE_URL").unwrap_or_else(|| DEFAULT_DICTIONARY_URL.to_string()),
    })
  }

  /// Configuration suitable for tests: no token, no database, `?` prefix.
  #[cfg(test)]
  pub fn for_tests() -> Self {
    Self {
      bot_token: String::new(),
      database_url: String::new(),
      admins: Vec::new(),
      prefix: DEFAULT_PREFIX.to_string(),
      log_chat: None,
      approval_queue_chat: None,
      roles: RoleConfig::default(),
      rules: RulesConfig::default(),
      session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
      dictionary_url: DEFAULT_DICTIONARY_URL.to_string(),
    }
  }
}

fn optional_var(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

fn parse_chat_id(key: &str) -> Result<Option<ChatId>> {
  optional_var(key)
    .map(|raw| {
      raw
        .parse::<i64>()
        .map(ChatId)
        .with_context(|| format!("{key} must be a numeric chat id"))
    })
    .transpose()
}

fn parse_admins(raw: &str) -> Vec<i64> {
  raw
    .split(',')
    .filter_map(|id| {
      let trimmed = id.trim();
      if trimmed.is_empty() {
        return None;
      }
      match trimmed.parse::<i64>() {
        Ok(value) => Some(value),
        Err(err) => {
          tracing::warn!(value = trimmed, error = %err, "invalid ADMIN_IDS entry");
          None
        },
      }
    })
    .collect()
}
