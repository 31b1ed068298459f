use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::bot::HandlerResult;
use crate::bot::context::AppContext;
use crate::bot::embed::Embed;
use crate::bot::registry::CommandEntry;
use crate::bot::registry::CommandHandler;
use crate::bot::registry::CommandRegistry;
use crate::bot::registry::HelpListing;
use crate::bot::registry::Incoming;
use crate::bot::registry::RegistryError;

mod admin;
mod community;
mod words;

/// Registers every built-in command. Runs once before the dispatcher starts.
pub fn register_all(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
  registry.register(
    CommandEntry::new("hjelp", "Syn alle tilgjengelege kommandoar", "❓", Arc::new(Help)).aliases(["help", "kommandoar"]),
  )?;
  registry.register(
    CommandEntry::new("ord", "Slå opp eit ord i ordbøkene.no", "📚", Arc::new(words::Lookup)).aliases(["ordbok", "lookup"]),
  )?;
  registry.register(
    CommandEntry::new(
      "kontekst",
      "Vurder om eit ord er feil i ein spesifikk kontekst",
      "🔍",
      Arc::new(words::Context),
    )
    .aliases(["context"]),
  )?;
  registry.register(
    CommandEntry::new("reglar", "Syn reglar og retningslinjer for gruppa", "📋", Arc::new(community::Rules))
      .aliases(["rules", "regler"]),
  )?;
  registry.register(
    CommandEntry::new(
      "spør",
      "Legg til eit spørsmål for daglege spørsmål",
      "❔",
      Arc::new(community::Ask),
    )
    .aliases(["spor"]),
  )?;
  registry.register(
    CommandEntry::new("rolle", "Administrer roller for brukarar", "👑", Arc::new(admin::ManageRole))
      .aliases(["role"])
      .admin_only(),
  )?;
  registry.register(
    CommandEntry::new("embed", "Opprett tilpassa embed-meldingar", "✨", Arc::new(admin::StartEmbed))
      .aliases(["lag-embed"])
      .admin_only(),
  )?;
  Ok(())
}

/// Sends an embed back to the chat the command came from.
async fn reply(ctx: &AppContext, msg: &Incoming, embed: Embed) -> HandlerResult {
  ctx.messenger().send_embed(msg.chat_id, &embed).await?;
  Ok(())
}

pub struct Help;

#[async_trait]
impl CommandHandler for Help {
  #[instrument(skip(self, ctx, msg), fields(user_id = msg.sender_id.0))]
  async fn handle(&self, ctx: &AppContext, msg: &Incoming) -> HandlerResult {
    let privileged = ctx.is_privileged(msg.sender_id).await;
    let listing = ctx.registry().help_listing(privileged);
    reply(ctx, msg, help_embed(&listing, &ctx.config().prefix)).await
  }
}

fn command_lines(entries: &[&CommandEntry], prefix: &str) -> String {
  entries
    .iter()
    .map(|entry| entry.help_line(prefix))
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn help_embed(listing: &HelpListing<'_>, prefix: &str) -> Embed {
  let mut embed = Embed::info(
    "Askeladden - Kommandoar",
    format!("Skriv {prefix}<kommando> for å bruke ein kommando."),
  )
  .field("Generelle kommandoar", command_lines(&listing.general, prefix));
  if !listing.admin.is_empty() {
    embed = embed.field("Admin-kommandoar", command_lines(&listing.admin, prefix));
  }
  embed
}
