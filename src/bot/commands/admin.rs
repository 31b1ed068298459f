use async_trait::async_trait;
use teloxide::types::UserId;
use thiserror::Error;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use super::reply;
use crate::bot::HandlerResult;
use crate::bot::context::AppContext;
use crate::bot::embed::Embed;
use crate::bot::registry::CommandHandler;
use crate::bot::registry::Incoming;
use crate::bot::wizard::INSTRUCTIONS;
use crate::config::RoleConfig;
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAction {
  Add,
  Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRequest {
  pub action: RoleAction,
  pub user: UserId,
  pub role: Role,
  pub role_id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoleCommandError {
  #[error("missing arguments")]
  Usage,
  #[error("unknown action")]
  InvalidAction,
  #[error("invalid user id")]
  InvalidUser,
  #[error("missing role")]
  MissingRole,
  #[error("unknown role")]
  UnknownRole,
  #[error("role {0} has no configured id")]
  NotConfigured(&'static str),
}

impl RoleCommandError {
  fn user_message(&self, prefix: &str) -> Embed {
    match self {
      Self::Usage => Embed::error(
        "Manglande parameter",
        format!(
          "Bruk: {prefix}rolle <add/remove> <brukar-ID> <rolle>\nTilgjengelege roller:\n• opplysar - Kan godkjenne \
           spørsmål og ord\n• rettskrivar - Kan godkjenne rettskriving"
        ),
      ),
      Self::InvalidAction => Embed::error("Ugyldig handling", "Bruk add eller remove"),
      Self::InvalidUser => Embed::error("Ugyldig brukar", "Oppgje den numeriske brukar-ID-en til brukaren"),
      Self::MissingRole => Embed::error(
        "Manglande rolle",
        "Du må spesifisere kva rolle som skal leggjast til/fjernast",
      ),
      Self::UnknownRole => Embed::error("Ukjend rolle", "Tilgjengelege roller: opplysar, rettskrivar"),
      Self::NotConfigured(role) => Embed::error(
        "Konfigurasjonsfeil",
        format!("Rolle-ID for {role} er ikkje konfigurert"),
      ),
    }
  }
}

/// Parses `<add/remove> <user id> <role>` against the configured role ids.
pub fn parse_role_request(args: &[&str], roles: &RoleConfig) -> Result<RoleRequest, RoleCommandError> {
  if args.len() < 2 {
    return Err(RoleCommandError::Usage);
  }
  let action = match args[0].to_lowercase().as_str() {
    "add" => RoleAction::Add,
    "remove" => RoleAction::Remove,
    _ => return Err(RoleCommandError::InvalidAction),
  };
  let user = args[1]
    .trim_start_matches('@')
    .parse::<u64>()
    .map(UserId)
    .map_err(|_| RoleCommandError::InvalidUser)?;
  let raw_role = args.get(2).ok_or(RoleCommandError::MissingRole)?;
  let role = Role::parse(raw_role).ok_or(RoleCommandError::UnknownRole)?;
  let role_id = roles
    .role_id(role)
    .ok_or(RoleCommandError::NotConfigured(role.name()))?
    .to_string();
  Ok(RoleRequest {
    action,
    user,
    role,
    role_id,
  })
}

pub struct ManageRole;

#[async_trait]
impl CommandHandler for ManageRole {
  #[instrument(skip(self, ctx, msg), fields(user_id = msg.sender_id.0))]
  async fn handle(&self, ctx: &AppContext, msg: &Incoming) -> HandlerResult {
    let request = match parse_role_request(&msg.args(), &ctx.config().roles) {
      Ok(request) => request,
      Err(err) => {
        info!(error = %err, "invalid role command");
        return reply(ctx, msg, err.user_message(&ctx.config().prefix)).await;
      },
    };

    let target_name = match ctx.messenger().display_name(request.user).await {
      Ok(name) => name,
      Err(err) => {
        info!(error = %err, target_user = request.user.0, "role target not found");
        return reply(ctx, msg, Embed::error("Feil", "Kunne ikkje finne brukaren")).await;
      },
    };

    let (result, verb, done) = match request.action {
      RoleAction::Add => (
        ctx.storage().grant_role(request.user, &request.role_id).await,
        "legge til",
        "lagt til",
      ),
      RoleAction::Remove => (
        ctx.storage().revoke_role(request.user, &request.role_id).await,
        "fjerne",
        "fjerna",
      ),
    };
    let role = request.role.name();

    match result {
      Ok(true) => {
        info!(target_user = request.user.0, role, action = ?request.action, "role updated");
        reply(
          ctx,
          msg,
          Embed::success(
            "Rolle oppdatert",
            format!("Rolla {role} har blitt {done} for {target_name}"),
          ),
        )
        .await
      },
      Ok(false) => {
        reply(
          ctx,
          msg,
          Embed::info(
            "Inga endring",
            format!("Rolla {role} var allereie {done} for {target_name}"),
          ),
        )
        .await
      },
      Err(err) => {
        warn!(error = %err, target_user = request.user.0, role, "role update failed");
        reply(
          ctx,
          msg,
          Embed::error("Feil", format!("Kunne ikkje {verb} rolle: {err}")),
        )
        .await
      },
    }
  }
}

pub struct StartEmbed;

#[async_trait]
impl CommandHandler for StartEmbed {
  #[instrument(skip(self, ctx, msg), fields(user_id = msg.sender_id.0, chat_id = %msg.chat_id))]
  async fn handle(&self, ctx: &AppContext, msg: &Incoming) -> HandlerResult {
    let Some(workspace) = msg.workspace_id else {
      return reply(
        ctx,
        msg,
        Embed::error(
          "Berre i grupper",
          "Bruk kommandoen i gruppa der embedden skal publiserast.",
        ),
      )
      .await;
    };

    let dm = match ctx.messenger().open_direct(msg.sender_id).await {
      Ok(dm) => dm,
      Err(err) => {
        warn!(error = %err, "could not open private chat");
        return reply(
          ctx,
          msg,
          Embed::error(
            "Feil",
            "Kunne ikkje opprette privat samtale. Start ein samtale med boten først.",
          ),
        )
        .await;
      },
    };

    if ctx.wizard().has_active(msg.sender_id).await {
      info!("replacing unfinished embed wizard");
    }
    ctx.wizard().start(msg.sender_id, workspace, dm).await;

    let instructions = Embed::info("✨ Embed-byggjar", INSTRUCTIONS);
    if let Err(err) = ctx.messenger().send_embed(dm, &instructions).await {
      warn!(error = %err, "failed to send wizard instructions");
      ctx.wizard().sessions().remove(msg.sender_id).await;
      return reply(
        ctx,
        msg,
        Embed::error(
          "Feil",
          "Kunne ikkje sende privat melding. Start ein samtale med boten og prøv igjen.",
        ),
      )
      .await;
    }

    reply(
      ctx,
      msg,
      Embed::success(
        "Embed-byggjar",
        "Sjekk dei private meldingane dine for instruksjonar om å byggje embedden!",
      ),
    )
    .await
  }
}

#[cfg(test)]
mod tests {
  use teloxide::types::ChatId;
  use teloxide::types::UserId;

  use super::ManageRole;
  use super::RoleAction;
  use super::RoleCommandError;
  use super::StartEmbed;
  use super::parse_role_request;
  use crate::bot::registry::CommandHandler;
  use crate::bot::session::WizardStep;
  use crate::bot::testing::GROUP;
  use crate::bot::testing::SENDER;
  use crate::bot::testing::direct;
  use crate::bot::testing::harness;
  use crate::bot::testing::incoming;
  use crate::config::Config;
  use crate::config::RoleConfig;
  use crate::models::Role;

  const TARGET: UserId = UserId(77);

  fn roles() -> RoleConfig {
    RoleConfig {
      opplysar: Some("opplysar-role".to_string()),
      rettskrivar: None,
    }
  }

  fn config() -> Config {
    let mut config = Config::for_tests();
    config.roles = roles();
    config
  }

  #[test]
  fn parses_role_requests() {
    let request = parse_role_request(&["ADD", "77", "Opplysar"], &roles()).expect("valid");
    assert_eq!(request.action, RoleAction::Add);
    assert_eq!(request.user, TARGET);
    assert_eq!(request.role, Role::Opplysar);
    assert_eq!(request.role_id, "opplysar-role");
  }

  #[test]
  fn reports_each_parse_failure() {
    let roles = roles();
    assert_eq!(parse_role_request(&["add"], &roles), Err(RoleCommandError::Usage));
    assert_eq!(
      parse_role_request(&["give", "77", "opplysar"], &roles),
      Err(RoleCommandError::InvalidAction)
    );
    assert_eq!(
      parse_role_request(&["add", "kari", "opplysar"], &roles),
      Err(RoleCommandError::InvalidUser)
    );
    assert_eq!(parse_role_request(&["add", "77"], &roles), Err(RoleCommandError::MissingRole));
    assert_eq!(
      parse_role_request(&["add", "77", "admin"], &roles),
      Err(RoleCommandError::UnknownRole)
    );
    assert_eq!(
      parse_role_request(&["remove", "77", "rettskrivar"], &roles),
      Err(RoleCommandError::NotConfigured("rettskrivar"))
    );
  }

  #[tokio::test]
  async fn grants_and_revokes_roles() {
    let h = harness(config());
    h.messenger.add_name(TARGET, "@ola");

    ManageRole
      .handle(&h.ctx, &incoming("?rolle add 77 opplysar"))
      .await
      .expect("handled");
    assert!(h.storage.roles.lock().unwrap().contains(&(77, "opplysar-role".to_string())));
    let embed = h.messenger.last_embed(GROUP).expect("confirmation");
    assert_eq!(embed.title, "Rolle oppdatert");
    assert!(embed.description.contains("@ola"));

    ManageRole
      .handle(&h.ctx, &incoming("?rolle add 77 opplysar"))
      .await
      .expect("handled");
    assert_eq!(h.messenger.last_embed(GROUP).expect("no-op").title, "Inga endring");

    ManageRole
      .handle(&h.ctx, &incoming("?rolle remove 77 opplysar"))
      .await
      .expect("handled");
    assert!(h.storage.roles.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn unknown_target_user_is_reported() {
    let h = harness(config());
    ManageRole
      .handle(&h.ctx, &incoming("?rolle add 77 opplysar"))
      .await
      .expect("handled");
    assert_eq!(h.messenger.last_embed(GROUP).expect("error").title, "Feil");
    assert!(h.storage.roles.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn embed_starts_wizard_in_private_chat() {
    let h = harness(Config::for_tests());
    StartEmbed.handle(&h.ctx, &incoming("?embed")).await.expect("handled");

    let session = h.ctx.wizard().sessions().get(SENDER).await.expect("session");
    assert_eq!(session.workspace_id, GROUP);
    assert_eq!(session.dm_chat, ChatId::from(SENDER));
    assert_eq!(session.step(), WizardStep::Title);
    assert_eq!(
      h.messenger.last_embed(ChatId::from(SENDER)).expect("instructions").title,
      "✨ Embed-byggjar"
    );
    assert_eq!(h.messenger.last_embed(GROUP).expect("confirmation").title, "Embed-byggjar");
  }

  #[tokio::test]
  async fn embed_needs_a_group() {
    let h = harness(Config::for_tests());
    StartEmbed.handle(&h.ctx, &direct("?embed")).await.expect("handled");
    assert!(!h.ctx.wizard().has_active(SENDER).await);
  }

  #[tokio::test]
  async fn undeliverable_instructions_drop_the_session() {
    let h = harness(Config::for_tests());
    h.messenger.fail_sends_to(ChatId::from(SENDER));
    StartEmbed.handle(&h.ctx, &incoming("?embed")).await.expect("handled");
    assert!(!h.ctx.wizard().has_active(SENDER).await);
    assert_eq!(h.messenger.last_embed(GROUP).expect("error").title, "Feil");
  }
}
