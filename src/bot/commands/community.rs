use async_trait::async_trait;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use super::reply;
use crate::bot::HandlerResult;
use crate::bot::context::AppContext;
use crate::bot::embed::Embed;
use crate::bot::embed::EmbedKind;
use crate::bot::registry::CommandHandler;
use crate::bot::registry::Incoming;
use crate::models::NewQuestion;

pub const DEFAULT_RULES_TITLE: &str = "📋 Reglar";
pub const DEFAULT_RULES_CONTENT: &str = "Ver snill og følg retningslinjene til Telegram og ver respektfull mot andre \
                                         medlemmar.\n\nFor meir detaljerte reglar, sjå festa meldingar eller spør \
                                         ein moderator.";

pub struct Rules;

#[async_trait]
impl CommandHandler for Rules {
  async fn handle(&self, ctx: &AppContext, msg: &Incoming) -> HandlerResult {
    let rules = &ctx.config().rules;
    let title = rules.title.as_deref().unwrap_or(DEFAULT_RULES_TITLE);
    let content = rules.content.as_deref().unwrap_or(DEFAULT_RULES_CONTENT);
    reply(ctx, msg, Embed::info(title, content)).await
  }
}

pub struct Ask;

#[async_trait]
impl CommandHandler for Ask {
  #[instrument(skip(self, ctx, msg), fields(user_id = msg.sender_id.0, chat_id = %msg.chat_id))]
  async fn handle(&self, ctx: &AppContext, msg: &Incoming) -> HandlerResult {
    let question = msg.rest();
    if question.is_empty() {
      let prefix = &ctx.config().prefix;
      return reply(
        ctx,
        msg,
        Embed::error(
          "❓ Feil",
          format!("Du må skrive eit spørsmål! Døme: {prefix}spør Kva er yndlingsmaten din?"),
        ),
      )
      .await;
    }

    let confirmation = Embed::new(
      "📝 Spørsmål motteke!",
      format!(
        "Takk! Spørsmålet ditt er sendt til godkjenning: \"{question}\"\n\nDu får ei melding når det blir godkjent \
         av opplysarane våre! ✨"
      ),
      EmbedKind::Info,
    );
    let confirmation_id = ctx.messenger().send_embed(msg.chat_id, &confirmation).await?;

    let record = NewQuestion {
      question: question.to_string(),
      author_id: msg.sender_id.0 as i64,
      author_name: msg.sender_name.clone(),
      message_id: confirmation_id.0,
      channel_id: msg.chat_id.0,
    };
    let question_id = match ctx.storage().add_question(&record).await {
      Ok(id) => id,
      Err(err) => {
        warn!(error = %err, "failed to store question");
        return reply(
          ctx,
          msg,
          Embed::error("❌ Feil", "Det oppstod ein feil ved lagring av spørsmålet."),
        )
        .await;
      },
    };
    info!(question_id, "question stored");

    self.confirm_privately(ctx, msg, question).await;

    let Some(queue) = ctx.config().approval_queue_chat else {
      warn!(question_id, "approval queue not configured");
      return reply(
        ctx,
        msg,
        Embed::new(
          "Konfigurasjonsfeil",
          "Godkjenningskøen er ikkje konfigurert. Spørsmålet er lagra, men ein administrator må sjå på det.",
          EmbedKind::Warning,
        ),
      )
      .await;
    };

    let queue_text = format!(
      "Nytt spørsmål frå {} ventar på godkjenning:\n> {question}\nSpørsmål-ID: {question_id}",
      msg.sender_name
    );
    match ctx.messenger().send_text(queue, &queue_text).await {
      Ok(queue_message) => {
        if let Err(err) = ctx.storage().set_approval_message_id(question_id, queue_message).await {
          warn!(error = %err, question_id, "failed to store approval message id");
        }
      },
      Err(err) => warn!(error = %err, question_id, queue = %queue, "failed to post question to approval queue"),
    }
    Ok(())
  }
}

impl Ask {
  /// Private copy of the confirmation. Users who never opened a chat with the bot miss it.
  async fn confirm_privately(&self, ctx: &AppContext, msg: &Incoming, question: &str) {
    let dm = match ctx.messenger().open_direct(msg.sender_id).await {
      Ok(dm) => dm,
      Err(err) => {
        warn!(error = %err, "could not open private chat");
        return;
      },
    };
    let embed = Embed::new(
      "📝 Spørsmål motteke!",
      format!(
        "Hei {}! 👋\n\nSpørsmålet ditt har blitt sendt til godkjenning:\n\n\"{question}\"\n\nDu får beskjed når \
         det blir godkjent av opplysarane våre! 📝✨",
        msg.sender_name
      ),
      EmbedKind::Info,
    );
    if let Err(err) = ctx.messenger().send_embed(dm, &embed).await {
      warn!(error = %err, "failed to send private confirmation");
    }
  }
}
