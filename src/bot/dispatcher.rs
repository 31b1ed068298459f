use std::sync::Arc;

use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::context::AppContext;
use crate::bot::embed::Embed;
use crate::bot::registry::CommandRegistry;
use crate::bot::registry::Incoming;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
  /// A handler ran. Carries the canonical command name.
  Handled(String),
  /// Admin-only command from an unprivileged caller.
  Rejected(String),
  NotFound,
}

/// Routes prefixed messages to the handler registered for their first word.
#[derive(Clone)]
pub struct CommandDispatcher {
  registry: Arc<CommandRegistry>,
  prefix: String,
}

impl CommandDispatcher {
  pub fn new(registry: Arc<CommandRegistry>, prefix: impl Into<String>) -> Self {
    Self {
      registry,
      prefix: prefix.into(),
    }
  }

  /// Extracts the command token: prefix stripped, first word, `@botname` dropped.
  pub fn command_token<'a>(&self, text: &'a str) -> Option<&'a str> {
    let text = text.trim_start();
    let body = text.strip_prefix(self.prefix.as_str()).unwrap_or(text);
    let token = body.split_whitespace().next()?;
    let token = token.split('@').next().unwrap_or(token);
    (!token.is_empty()).then_some(token)
  }

  #[instrument(skip(self, msg, ctx), fields(chat_id = %msg.chat_id, user_id = msg.sender_id.0))]
  pub async fn dispatch(&self, msg: &Incoming, ctx: &AppContext) -> DispatchOutcome {
    let Some(token) = self.command_token(&msg.text) else {
      return DispatchOutcome::NotFound;
    };
    let Some(entry) = self.registry.resolve(token) else {
      return DispatchOutcome::NotFound;
    };
    let command = entry.name.clone();

    if entry.admin_only && !ctx.is_privileged(msg.sender_id).await {
      info!(command = %command, "admin command rejected");
      let rejection = Embed::error("Ingen tilgang", "Denne kommandoen er berre for administratorar.");
      if let Err(err) = ctx.messenger().send_embed(msg.chat_id, &rejection).await {
        warn!(error = %err, "failed to send rejection");
      }
      return DispatchOutcome::Rejected(command);
    }

    info!(command = %command, "handling command");
    if let Err(err) = entry.handler.handle(ctx, msg).await {
      warn!(command = %command, error = %err, "command handler failed");
      let failure = Embed::error("Feil", "Noko gjekk gale under køyringa av kommandoen. Prøv igjen seinare.");
      if let Err(err) = ctx.messenger().send_embed(msg.chat_id, &failure).await {
        warn!(error = %err, "failed to send failure notice");
      }
    }
    DispatchOutcome::Handled(command)
  }
}
