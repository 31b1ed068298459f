use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Result;
use anyhow::bail;
use async_trait::async_trait;
use teloxide::types::ChatId;
use teloxide::types::MessageId;
use teloxide::types::UserId;

use crate::bot::commands;
use crate::bot::context::AppContext;
use crate::bot::embed::Embed;
use crate::bot::messenger::Messenger;
use crate::bot::messenger::MessengerError;
use crate::bot::registry::CommandRegistry;
use crate::bot::registry::Incoming;
use crate::config::Config;
use crate::db::Storage;
use crate::dictionary::DictionaryClient;
use crate::models::NewQuestion;

pub const SENDER: UserId = UserId(42);
pub const GROUP: ChatId = ChatId(-1001);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
  Text(String),
  Embed(Embed),
}

/// Records everything sent and answers lookups from preloaded tables.
#[derive(Default)]
pub struct RecordingMessenger {
  sent: Mutex<Vec<(ChatId, Sent)>>,
  workspaces: Mutex<HashMap<ChatId, ChatId>>,
  names: Mutex<HashMap<UserId, String>>,
  failing: Mutex<HashSet<ChatId>>,
  next_id: Mutex<i32>,
}

impl RecordingMessenger {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_chat(&self, chat: ChatId, workspace: ChatId) {
    self.workspaces.lock().unwrap().insert(chat, workspace);
  }

  pub fn add_name(&self, user: UserId, name: &str) {
    self.names.lock().unwrap().insert(user, name.to_string());
  }

  pub fn fail_sends_to(&self, chat: ChatId) {
    self.failing.lock().unwrap().insert(chat);
  }

  pub fn sent_to(&self, chat: ChatId) -> Vec<Sent> {
    self
      .sent
      .lock()
      .unwrap()
      .iter()
      .filter(|(target, _)| *target == chat)
      .map(|(_, sent)| sent.clone())
      .collect()
  }

  pub fn embeds_to(&self, chat: ChatId) -> Vec<Embed> {
    self
      .sent_to(chat)
      .into_iter()
      .filter_map(|sent| match sent {
        Sent::Embed(embed) => Some(embed),
        Sent::Text(_) => None,
      })
      .collect()
  }

  pub fn texts_to(&self, chat: ChatId) -> Vec<String> {
    self
      .sent_to(chat)
      .into_iter()
      .filter_map(|sent| match sent {
        Sent::Text(text) => Some(text),
        Sent::Embed(_) => None,
      })
      .collect()
  }

  pub fn last_embed(&self, chat: ChatId) -> Option<Embed> {
    self.embeds_to(chat).pop()
  }

  pub fn total_sent(&self) -> usize {
    self.sent.lock().unwrap().len()
  }

  fn record(&self, chat: ChatId, sent: Sent) -> Result<MessageId, MessengerError> {
    if self.failing.lock().unwrap().contains(&chat) {
      return Err(MessengerError::Rejected("forbidden".to_string()));
    }
    self.sent.lock().unwrap().push((chat, sent));
    let mut next_id = self.next_id.lock().unwrap();
    *next_id += 1;
    Ok(MessageId(*next_id))
  }
}

#[async_trait]
impl Messenger for RecordingMessenger {
  async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId, MessengerError> {
    self.record(chat, Sent::Text(text.to_string()))
  }

  async fn send_embed(&self, chat: ChatId, embed: &Embed) -> Result<MessageId, MessengerError> {
    self.record(chat, Sent::Embed(embed.clone()))
  }

  async fn chat_workspace(&self, chat: ChatId) -> Result<ChatId, MessengerError> {
    self
      .workspaces
      .lock()
      .unwrap()
      .get(&chat)
      .copied()
      .ok_or(MessengerError::NotFound)
  }

  async fn open_direct(&self, user: UserId) -> Result<ChatId, MessengerError> {
    Ok(ChatId::from(user))
  }

  async fn display_name(&self, user: UserId) -> Result<String, MessengerError> {
    self
      .names
      .lock()
      .unwrap()
      .get(&user)
      .cloned()
      .ok_or(MessengerError::NotFound)
  }
}

#[derive(Default)]
pub struct MemoryStorage {
  pub questions: Mutex<Vec<NewQuestion>>,
  pub approval_ids: Mutex<HashMap<i64, MessageId>>,
  pub roles: Mutex<HashSet<(u64, String)>>,
  pub broken: bool,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn broken() -> Self {
    Self {
      broken: true,
      ..Self::default()
    }
  }
}

#[async_trait]
impl Storage for MemoryStorage {
  async fn add_question(&self, question: &NewQuestion) -> Result<i64> {
    if self.broken {
      bail!("database unavailable");
    }
    let mut questions = self.questions.lock().unwrap();
    questions.push(question.clone());
    Ok(questions.len() as i64)
  }

  async fn set_approval_message_id(&self, question_id: i64, message_id: MessageId) -> Result<()> {
    self.approval_ids.lock().unwrap().insert(question_id, message_id);
    Ok(())
  }

  async fn grant_role(&self, user: UserId, role_id: &str) -> Result<bool> {
    if self.broken {
      bail!("database unavailable");
    }
    Ok(self.roles.lock().unwrap().insert((user.0, role_id.to_string())))
  }

  async fn revoke_role(&self, user: UserId, role_id: &str) -> Result<bool> {
    if self.broken {
      bail!("database unavailable");
    }
    Ok(self.roles.lock().unwrap().remove(&(user.0, role_id.to_string())))
  }

  async fn has_role(&self, user: UserId, role_id: &str) -> Result<bool> {
    if self.broken {
      bail!("database unavailable");
    }
    Ok(self.roles.lock().unwrap().contains(&(user.0, role_id.to_string())))
  }
}

/// A group message from [`SENDER`].
pub fn incoming(text: &str) -> Incoming {
  Incoming {
    chat_id: GROUP,
    workspace_id: Some(GROUP),
    sender_id: SENDER,
    sender_name: "@kari".to_string(),
    text: text.to_string(),
  }
}

/// The same message, sent in the private chat with the bot.
pub fn direct(text: &str) -> Incoming {
  Incoming {
    chat_id: ChatId::from(SENDER),
    workspace_id: None,
    ..incoming(text)
  }
}

pub struct Harness {
  pub ctx: AppContext,
  pub messenger: Arc<RecordingMessenger>,
  pub storage: Arc<MemoryStorage>,
}

pub fn harness(config: Config) -> Harness {
  harness_with_storage(config, MemoryStorage::new())
}

pub fn harness_with_storage(config: Config, storage: MemoryStorage) -> Harness {
  let messenger = Arc::new(RecordingMessenger::new());
  messenger.add_chat(GROUP, GROUP);
  let storage = Arc::new(storage);

  let mut registry = CommandRegistry::new();
  commands::register_all(&mut registry).expect("built-in commands register");
  let dictionary = DictionaryClient::new(&config.dictionary_url).expect("http client");

  let ctx = AppContext::new(config, storage.clone(), messenger.clone(), dictionary, Arc::new(registry));
  Harness {
    ctx,
    messenger,
    storage,
  }
}
