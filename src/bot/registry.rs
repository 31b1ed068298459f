use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use teloxide::types::ChatId;
use teloxide::types::UserId;
use thiserror::Error;
use tracing::warn;

use crate::bot::HandlerResult;
use crate::bot::context::AppContext;

/// A text message as seen by command handlers, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
  pub chat_id: ChatId,
  /// Group the message was sent in; `None` for private chats.
  pub workspace_id: Option<ChatId>,
  pub sender_id: UserId,
  pub sender_name: String,
  pub text: String,
}

impl Incoming {
  /// Whitespace separated words after the command token.
  pub fn args(&self) -> Vec<&str> {
    self.text.split_whitespace().skip(1).collect()
  }

  /// Everything after the command token, with the original spacing inside.
  pub fn rest(&self) -> &str {
    let trimmed = self.text.trim_start();
    match trimmed.find(char::is_whitespace) {
      Some(idx) => trimmed[idx ..].trim(),
      None => "",
    }
  }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
  async fn handle(&self, ctx: &AppContext, msg: &Incoming) -> HandlerResult;
}

#[derive(Clone)]
pub struct CommandEntry {
  pub name: String,
  pub description: String,
  pub emoji: String,
  pub aliases: Vec<String>,
  pub admin_only: bool,
  pub handler: Arc<dyn CommandHandler>,
}

impl CommandEntry {
  pub fn new(
    name: impl Into<String>,
    description: impl Into<String>,
    emoji: impl Into<String>,
    handler: Arc<dyn CommandHandler>,
  ) -> Self {
    Self {
      name: name.into(),
      description: description.into(),
      emoji: emoji.into(),
      aliases: Vec::new(),
      admin_only: false,
      handler,
    }
  }

  pub fn aliases<I, S>(mut self, aliases: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    for alias in aliases {
      let alias = alias.into();
      if !self.aliases.contains(&alias) {
        self.aliases.push(alias);
      }
    }
    self
  }

  pub fn admin_only(mut self) -> Self {
    self.admin_only = true;
    self
  }

  pub fn help_line(&self, prefix: &str) -> String {
    format!("{} {prefix}{} - {}", self.emoji, self.name, self.description)
  }
}

impl std::fmt::Debug for CommandEntry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CommandEntry")
      .field("name", &self.name)
      .field("aliases", &self.aliases)
      .field("admin_only", &self.admin_only)
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
  #[error("alias '{alias}' of '{command}' is already taken by '{owner}'")]
  AliasTaken {
    alias: String,
    command: String,
    owner: String,
  },
  #[error("command name '{command}' is already an alias of '{owner}'")]
  NameShadowsAlias { command: String, owner: String },
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct HelpListing<'a> {
  pub general: Vec<&'a CommandEntry>,
  pub admin: Vec<&'a CommandEntry>,
}

impl PartialEq for CommandEntry {
  fn eq(&self, other: &Self) -> bool {
    self.name == other.name
      && self.aliases == other.aliases
      && self.admin_only == other.admin_only
      && Arc::ptr_eq(&self.handler, &other.handler)
  }
}

impl Eq for CommandEntry {}

/// Name and alias lookup for every command the bot understands.
///
/// Built once at startup by [`crate::bot::commands::register_all`] and only read afterwards.
#[derive(Default)]
pub struct CommandRegistry {
  entries: Vec<CommandEntry>,
  by_name: HashMap<String, usize>,
  by_alias: HashMap<String, String>,
}

impl CommandRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers a command. Re-registering a name replaces the old entry; aliases must be
  /// unique across every command.
  pub fn register(&mut self, entry: CommandEntry) -> Result<(), RegistryError> {
    if let Some(owner) = self.by_alias.get(&entry.name) {
      return Err(RegistryError::NameShadowsAlias {
        command: entry.name.clone(),
        owner: owner.clone(),
      });
    }

    for alias in &entry.aliases {
      if let Some(owner) = self.by_alias.get(alias)
        && owner != &entry.name
      {
        return Err(RegistryError::AliasTaken {
          alias: alias.clone(),
          command: entry.name.clone(),
          owner: owner.clone(),
        });
      }
      if self.by_name.contains_key(alias) && alias != &entry.name {
        return Err(RegistryError::AliasTaken {
          alias: alias.clone(),
          command: entry.name.clone(),
          owner: alias.clone(),
        });
      }
    }

    if let Some(&index) = self.by_name.get(&entry.name) {
      warn!(command = %entry.name, "command registered twice, replacing previous entry");
      let replaced = std::mem::replace(&mut self.entries[index], entry);
      for alias in &replaced.aliases {
        self.by_alias.remove(alias);
      }
      let current = &self.entries[index];
      for alias in &current.aliases {
        self.by_alias.insert(alias.clone(), current.name.clone());
      }
      return Ok(());
    }

    for alias in &entry.aliases {
      self.by_alias.insert(alias.clone(), entry.name.clone());
    }
    self.by_name.insert(entry.name.clone(), self.entries.len());
    self.entries.push(entry);
    Ok(())
  }

  /// Exact name first, then aliases.
  pub fn resolve(&self, token: &str) -> Option<&CommandEntry> {
    if let Some(&index) = self.by_name.get(token) {
      return self.entries.get(index);
    }
    let name = self.by_alias.get(token)?;
    self.by_name.get(name).and_then(|&index| self.entries.get(index))
  }

  pub fn is_admin_only(&self, token: &str) -> bool {
    self.resolve(token).is_some_and(|entry| entry.admin_only)
  }

  /// Commands in registration order; admin-only ones only when `include_admin` is set.
  pub fn list_all(&self, include_admin: bool) -> Vec<&CommandEntry> {
    self
      .entries
      .iter()
      .filter(|entry| include_admin || !entry.admin_only)
      .collect()
  }

  pub fn help_listing(&self, include_admin: bool) -> HelpListing<'_> {
    let (admin, general): (Vec<&CommandEntry>, Vec<&CommandEntry>) =
      self.list_all(include_admin).into_iter().partition(|entry| entry.admin_only);
    HelpListing { general, admin }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }
}
