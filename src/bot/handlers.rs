use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::Message;
use teloxide::types::User;
use tracing::debug;
use tracing::info;
use tracing::instrument;

use crate::bot::HandlerResult;
use crate::bot::context::AppContext;
use crate::bot::dispatcher::CommandDispatcher;
use crate::bot::dispatcher::DispatchOutcome;
use crate::bot::registry::Incoming;
use crate::bot::wizard::WizardOutcome;

type SharedContext = Arc<AppContext>;
type SharedDispatcher = Arc<CommandDispatcher>;

pub fn build_schema() -> UpdateHandler<anyhow::Error> {
  Update::filter_message().endpoint(handle_message)
}

#[instrument(skip(ctx, dispatcher, msg), fields(chat_id = %msg.chat.id))]
async fn handle_message(ctx: SharedContext, dispatcher: SharedDispatcher, msg: Message) -> HandlerResult {
  let Some(incoming) = to_incoming(&msg) else {
    return Ok(());
  };
  route(&ctx, &dispatcher, &incoming).await
}

/// A sender with an open wizard talks only to the wizard; everyone else may run commands.
async fn route(ctx: &AppContext, dispatcher: &CommandDispatcher, incoming: &Incoming) -> HandlerResult {
  let outcome = ctx.wizard().handle(incoming.sender_id, &incoming.text).await?;
  if outcome != WizardOutcome::NoSession {
    info!(
      user_id = incoming.sender_id.0,
      ?outcome,
      finished = outcome.is_terminal(),
      "message consumed by embed wizard"
    );
    return Ok(());
  }

  if !incoming.text.trim_start().starts_with(ctx.config().prefix.as_str()) {
    return Ok(());
  }
  match dispatcher.dispatch(incoming, ctx).await {
    DispatchOutcome::NotFound => debug!(text = %incoming.text, "no command matched"),
    outcome => debug!(?outcome, "command dispatched"),
  }
  Ok(())
}

fn to_incoming(msg: &Message) -> Option<Incoming> {
  let sender = msg.from.as_ref()?;
  if sender.is_bot {
    return None;
  }
  let text = message_text(msg)?;
  let workspace_id = (msg.chat.is_group() || msg.chat.is_supergroup()).then_some(msg.chat.id);
  Some(Incoming {
    chat_id: msg.chat.id,
    workspace_id,
    sender_id: sender.id,
    sender_name: display_name(sender),
    text: text.to_string(),
  })
}

fn message_text(msg: &Message) -> Option<&str> {
  msg.text().or_else(|| msg.caption())
}

fn display_name(user: &User) -> String {
  match &user.username {
    Some(username) => format!("@{username}"),
    None => user.first_name.clone(),
  }
}
