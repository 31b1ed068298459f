use async_trait::async_trait;
use teloxide::ApiError;
use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::types::MessageId;
use teloxide::types::ParseMode;
use teloxide::types::UserId;
use thiserror::Error;
use tracing::debug;
use tracing::instrument;

use crate::bot::embed::Embed;

#[derive(Debug, Error)]
pub enum MessengerError {
  #[error("chat or user not found")]
  NotFound,
  #[error("request rejected: {0}")]
  Rejected(String),
}

impl From<RequestError> for MessengerError {
  fn from(err: RequestError) -> Self {
    match err {
      RequestError::Api(ApiError::ChatNotFound) | RequestError::Api(ApiError::UserNotFound) => Self::NotFound,
      other => Self::Rejected(other.to_string()),
    }
  }
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait Messenger: Send + Sync {
  async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId, MessengerError>;

  async fn send_embed(&self, chat: ChatId, embed: &Embed) -> Result<MessageId, MessengerError>;

  /// Resolves a chat to the group it belongs to.
  async fn chat_workspace(&self, chat: ChatId) -> Result<ChatId, MessengerError>;

  async fn open_direct(&self, user: UserId) -> Result<ChatId, MessengerError>;

  async fn display_name(&self, user: UserId) -> Result<String, MessengerError>;
}

#[derive(Clone)]
pub struct TelegramMessenger {
  bot: Bot,
}

impl TelegramMessenger {
  pub fn new(bot: Bot) -> Self {
    Self { bot }
  }
}

#[async_trait]
impl Messenger for TelegramMessenger {
  #[instrument(skip(self, text))]
  async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId, MessengerError> {
    let message = self.bot.send_message(chat, text.to_string()).await?;
    Ok(message.id)
  }

  /// Long embeds go out as several messages; the id of the first one is returned.
  #[instrument(skip(self, embed), fields(title = %embed.title))]
  async fn send_embed(&self, chat: ChatId, embed: &Embed) -> Result<MessageId, MessengerError> {
    let parts = embed.to_markdown_parts();
    if parts.len() > 1 {
      debug!(parts = parts.len(), "splitting long embed");
    }
    let mut first = None;
    for part in parts {
      let message = self
        .bot
        .send_message(chat, part)
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
      if first.is_none() {
        first = Some(message.id);
      }
    }
    first.ok_or_else(|| MessengerError::Rejected("empty embed".to_string()))
  }

  #[instrument(skip(self))]
  async fn chat_workspace(&self, chat: ChatId) -> Result<ChatId, MessengerError> {
    let info = self.bot.get_chat(chat).await?;
    if info.is_private() {
      return Err(MessengerError::NotFound);
    }
    // A broadcast channel belongs to the group it is linked with.
    if info.is_channel()
      && let Some(linked) = info.linked_chat_id()
    {
      return Ok(ChatId(linked));
    }
    Ok(info.id)
  }

  async fn open_direct(&self, user: UserId) -> Result<ChatId, MessengerError> {
    // Private chats share their id with the user; delivery fails later if the user never
    // started the bot.
    Ok(ChatId::from(user))
  }

  #[instrument(skip(self))]
  async fn display_name(&self, user: UserId) -> Result<String, MessengerError> {
    let info = self.bot.get_chat(ChatId::from(user)).await?;
    let name = info
      .username()
      .map(|username| format!("@{username}"))
      .or_else(|| info.first_name().map(str::to_string))
      .ok_or(MessengerError::NotFound)?;
    Ok(name)
  }
}
