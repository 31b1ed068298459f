use std::collections::HashSet;
use std::sync::Arc;

use teloxide::types::UserId;
use tracing::warn;

use crate::bot::messenger::Messenger;
use crate::bot::registry::CommandRegistry;
use crate::bot::session::SessionStore;
use crate::bot::wizard::WizardEngine;
use crate::config::Config;
use crate::db::Storage;
use crate::dictionary::DictionaryClient;
use crate::models::Role;

#[derive(Clone)]
pub struct AppContext {
  config: Arc<Config>,
  storage: Arc<dyn Storage>,
  messenger: Arc<dyn Messenger>,
  wizard: WizardEngine,
  dictionary: DictionaryClient,
  registry: Arc<CommandRegistry>,
  admins: HashSet<i64>,
}

impl AppContext {
  pub fn new(
    config: Config,
    storage: Arc<dyn Storage>,
    messenger: Arc<dyn Messenger>,
    dictionary: DictionaryClient,
    registry: Arc<CommandRegistry>,
  ) -> Self {
    let wizard = WizardEngine::new(SessionStore::new(), messenger.clone(), config.log_chat);
    Self {
      admins: config.admins.iter().copied().collect(),
      config: Arc::new(config),
      storage,
      messenger,
      wizard,
      dictionary,
      registry,
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn storage(&self) -> &dyn Storage {
    self.storage.as_ref()
  }

  pub fn messenger(&self) -> &dyn Messenger {
    self.messenger.as_ref()
  }

  pub fn wizard(&self) -> &WizardEngine {
    &self.wizard
  }

  pub fn dictionary(&self) -> &DictionaryClient {
    &self.dictionary
  }

  pub fn registry(&self) -> &CommandRegistry {
    &self.registry
  }

  pub fn registry_handle(&self) -> Arc<CommandRegistry> {
    self.registry.clone()
  }

  pub fn is_admin(&self, tg_id: i64) -> bool {
    self.admins.contains(&tg_id)
  }

  /// Bot admins and holders of the opplysar role may run admin-only commands.
  pub async fn is_privileged(&self, user: UserId) -> bool {
    if self.is_admin(user.0 as i64) {
      return true;
    }
    let Some(role_id) = self.config.roles.role_id(Role::Opplysar) else {
      return false;
    };
    match self.storage.has_role(user, role_id).await {
      Ok(granted) => granted,
      Err(err) => {
        warn!(error = %err, user_id = user.0, "role lookup failed, treating user as unprivileged");
        false
      },
    }
  }
}
