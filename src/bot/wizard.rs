use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use chrono::Utc;
use teloxide::types::ChatId;
use teloxide::types::UserId;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::embed::Embed;
use crate::bot::embed::EmbedKind;
use crate::bot::messenger::Messenger;
use crate::bot::messenger::MessengerError;
use crate::bot::session::EmbedDraft;
use crate::bot::session::SessionGuard;
use crate::bot::session::SessionStore;
use crate::bot::session::WizardSession;
use crate::bot::session::WizardState;
use crate::bot::session::WizardStep;
use crate::util::ColorError;
use crate::util::format_hex_color;
use crate::util::parse_hex_color;

pub const CANCEL_KEYWORD: &str = "avbryt";
pub const FINISH_KEYWORD: &str = "ferdig";
pub const MAX_TITLE_CHARS: usize = 256;
pub const MAX_CONTENT_CHARS: usize = 4096;
pub const PUBLISHED_FOOTER: &str = "Laga av Askeladden";

pub const INSTRUCTIONS: &str = "Velkommen til embed-byggjaren! Følg desse stega:\n\n\
  1️⃣ Send tittelen på embedden\n\
  2️⃣ Send innhaldet/beskrivinga\n\
  3️⃣ Send chat-ID-en der embedden skal sendast\n\
  4️⃣ (Valfritt) Send farge som hex-kode (t.d. #ff0000)\n\n\
  Send avbryt når som helst for å avbryte.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardOutcome {
  /// The sender has no active session.
  NoSession,
  Advanced(WizardStep),
  /// Input was rejected; the session stays where it was.
  Retry(WizardStep),
  /// The colour loop accepted a new colour.
  ColorUpdated(u32),
  Cancelled,
  Published,
  /// Delivery to the target failed. The session is gone all the same.
  PublishFailed,
}

impl WizardOutcome {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Cancelled | Self::Published | Self::PublishFailed)
  }
}

/// Walks a user through title, content, target and colour, one message per step.
#[derive(Clone)]
pub struct WizardEngine {
  sessions: SessionStore,
  messenger: Arc<dyn Messenger>,
  log_chat: Option<ChatId>,
}

impl WizardEngine {
  pub fn new(sessions: SessionStore, messenger: Arc<dyn Messenger>, log_chat: Option<ChatId>) -> Self {
    Self {
      sessions,
      messenger,
      log_chat,
    }
  }

  pub fn sessions(&self) -> &SessionStore {
    &self.sessions
  }

  #[instrument(skip(self))]
  pub async fn start(&self, user: UserId, workspace: ChatId, dm_chat: ChatId) {
    self.sessions.start(user, workspace, dm_chat).await;
    info!(user_id = user.0, workspace_id = %workspace, "embed wizard started");
  }

  pub async fn has_active(&self, user: UserId) -> bool {
    self.sessions.has_active(user).await
  }

  /// Drops sessions idle for longer than `max_idle` and tells their owners.
  pub async fn expire_idle(&self, max_idle: Duration) -> usize {
    let expired = self.sessions.expire_idle(Utc::now(), max_idle).await;
    for session in &expired {
      info!(user_id = session.user_id.0, step = ?session.step(), "embed wizard expired");
      self
        .notify(
          session.dm_chat,
          Embed::new(
            "⏰ Tidsavbrot",
            "Embed-bygginga vart avbroten fordi du ikkje svarte. Start på nytt med embed-kommandoen.",
            EmbedKind::Warning,
          ),
        )
        .await;
    }
    expired.len()
  }

  /// Feeds one message into the sender's session.
  #[instrument(skip(self, text))]
  pub async fn handle(&self, user: UserId, text: &str) -> Result<WizardOutcome> {
    let Some(mut guard) = self.sessions.lock(user).await else {
      return Ok(WizardOutcome::NoSession);
    };
    let dm_chat = guard.session().dm_chat;

    if text.trim().to_lowercase() == CANCEL_KEYWORD {
      guard.finish().await;
      info!(user_id = user.0, "embed wizard cancelled");
      self
        .notify(dm_chat, Embed::error("❌ Avbrutt", "Embed-bygging avbrutt."))
        .await;
      return Ok(WizardOutcome::Cancelled);
    }

    guard.session_mut().touched_at = Utc::now();
    let state = guard.session().state.clone();
    let outcome = match state {
      WizardState::Title => self.accept_title(&mut guard, text).await,
      WizardState::Content { title } => self.accept_content(&mut guard, title, text).await,
      WizardState::Target { title, content } => self.accept_target(&mut guard, title, content, text).await,
      WizardState::ColorOrFinish(draft) => self.accept_color_or_finish(guard, draft, text).await,
    };
    info!(user_id = user.0, ?outcome, "embed wizard step handled");
    Ok(outcome)
  }

  async fn accept_title(&self, guard: &mut SessionGuard, text: &str) -> WizardOutcome {
    let dm_chat = guard.session().dm_chat;
    let title = text.trim();
    if title.chars().count() > MAX_TITLE_CHARS {
      self
        .notify(
          dm_chat,
          Embed::error(
            "Tittel for lang",
            format!("Tittelen kan maksimalt vere {MAX_TITLE_CHARS} teikn. Prøv igjen."),
          ),
        )
        .await;
      return WizardOutcome::Retry(WizardStep::Title);
    }

    guard.session_mut().state = WizardState::Content {
      title: title.to_string(),
    };
    self
      .notify(
        dm_chat,
        Embed::success(
          "✅ Tittel lagra",
          format!("Tittel: {title}\n\nNo send beskrivinga/innhaldet for embedden."),
        ),
      )
      .await;
    WizardOutcome::Advanced(WizardStep::Content)
  }

  async fn accept_content(&self, guard: &mut SessionGuard, title: String, text: &str) -> WizardOutcome {
    let dm_chat = guard.session().dm_chat;
    let content = text.trim();
    if content.chars().count() > MAX_CONTENT_CHARS {
      self
        .notify(
          dm_chat,
          Embed::error(
            "Innhald for langt",
            format!("Innhaldet kan maksimalt vere {MAX_CONTENT_CHARS} teikn. Prøv igjen."),
          ),
        )
        .await;
      return WizardOutcome::Retry(WizardStep::Content);
    }

    guard.session_mut().state = WizardState::Target {
      title,
      content: content.to_string(),
    };
    self
      .notify(
        dm_chat,
        Embed::success(
          "✅ Innhald lagra",
          "No send chat-ID-en der embedden skal sendast.\n\nTips: Vidaresend ei melding frå chatten til ein ID-bot \
           for å finne ID-en.",
        ),
      )
      .await;
    WizardOutcome::Advanced(WizardStep::Target)
  }

  async fn accept_target(&self, guard: &mut SessionGuard, title: String, content: String, text: &str) -> WizardOutcome {
    let session = guard.session().clone();
    let raw = text.trim();

    let resolved = match raw.parse::<i64>() {
      Ok(id) => self.messenger.chat_workspace(ChatId(id)).await.map(|ws| (ChatId(id), ws)),
      Err(_) => Err(MessengerError::NotFound),
    };

    let target = match resolved {
      Ok((target, workspace)) if workspace == session.workspace_id => target,
      Ok((target, workspace)) => {
        info!(target_chat = %target, workspace = %workspace, expected = %session.workspace_id, "target outside workspace");
        self
          .notify(
            session.dm_chat,
            Embed::error(
              "Feil gruppe",
              "Chatten må høyre til same gruppe der du køyrde kommandoen.",
            ),
          )
          .await;
        return WizardOutcome::Retry(WizardStep::Target);
      },
      Err(err) => {
        info!(input = raw, error = %err, "target chat could not be resolved");
        self
          .notify(
            session.dm_chat,
            Embed::error(
              "Ugyldig chat",
              "Kunne ikkje finne chatten. Sjekk at chat-ID-en er korrekt og at boten er med der.",
            ),
          )
          .await;
        return WizardOutcome::Retry(WizardStep::Target);
      },
    };

    let draft = EmbedDraft {
      title,
      content,
      target,
    };
    let preview = preview_embed(&draft, session.color);
    guard.session_mut().state = WizardState::ColorOrFinish(draft);

    self
      .notify(
        session.dm_chat,
        Embed::success(
          "✅ Chat lagra",
          format!("Chatten: {target}\n\nFørehandsvising av embedden:"),
        ),
      )
      .await;
    self.notify(session.dm_chat, preview).await;
    self
      .notify(
        session.dm_chat,
        Embed::info(
          "🎨 Valfritt: Farge",
          format!(
            "Send ein hex-fargekode (t.d. #ff0000) for å endre fargen, eller send {FINISH_KEYWORD} for å publisere \
             embedden no."
          ),
        ),
      )
      .await;
    WizardOutcome::Advanced(WizardStep::ColorOrFinish)
  }

  async fn accept_color_or_finish(&self, mut guard: SessionGuard, draft: EmbedDraft, text: &str) -> WizardOutcome {
    let session = guard.session().clone();
    let input = text.trim().to_lowercase();

    if input == FINISH_KEYWORD {
      // The session is consumed whether or not delivery works.
      guard.finish().await;
      return self.publish(&session, &draft).await;
    }

    match parse_hex_color(&input) {
      Ok(color) => {
        guard.session_mut().color = color;
        info!(user_id = session.user_id.0, color = %format_hex_color(color), "embed colour updated");
        self
          .notify(
            session.dm_chat,
            Embed::success("🎨 Farge oppdatert", "Oppdatert førehandsvising:"),
          )
          .await;
        self.notify(session.dm_chat, preview_embed(&draft, color)).await;
        self
          .notify(
            session.dm_chat,
            Embed::info(
              "✨ Klar til publisering",
              format!("Send {FINISH_KEYWORD} for å publisere embedden no."),
            ),
          )
          .await;
        return WizardOutcome::ColorUpdated(color);
      },
      Err(ColorError::InvalidFormat) => {
        self
          .notify(
            session.dm_chat,
            Embed::error(
              "Ugyldig farge",
              format!("Bruk format som #ff0000. Send {FINISH_KEYWORD} for å publisere med standard farge."),
            ),
          )
          .await;
      },
      Err(ColorError::MissingHash) => {
        self
          .notify(
            session.dm_chat,
            Embed::error(
              "Ukjend kommando",
              format!("Send ein hex-fargekode (t.d. #ff0000) eller {FINISH_KEYWORD} for å publisere."),
            ),
          )
          .await;
      },
    }
    WizardOutcome::Retry(WizardStep::ColorOrFinish)
  }

  async fn publish(&self, session: &WizardSession, draft: &EmbedDraft) -> WizardOutcome {
    let final_embed = preview_embed(draft, session.color).footer(PUBLISHED_FOOTER);

    if let Err(err) = self.messenger.send_embed(draft.target, &final_embed).await {
      warn!(error = %err, target_chat = %draft.target, user_id = session.user_id.0, "failed to publish embed");
      self
        .notify(
          session.dm_chat,
          Embed::error("Publiseringsfeil", format!("Kunne ikkje sende embedden: {err}")),
        )
        .await;
      return WizardOutcome::PublishFailed;
    }

    info!(target_chat = %draft.target, user_id = session.user_id.0, "embed published");
    self
      .notify(
        session.dm_chat,
        Embed::success(
          "✅ Publisert!",
          format!("Embedden har blitt sendt til {}!", draft.target),
        ),
      )
      .await;

    if let Some(log_chat) = self.log_chat {
      let username = self
        .messenger
        .display_name(session.user_id)
        .await
        .unwrap_or_else(|_| "Ukjend brukar".to_string());
      self
        .notify(
          log_chat,
          Embed::info(
            "📝 Embed publisert",
            format!(
              "Brukar: {username}\nChat: {}\nTittel: {}",
              draft.target, draft.title
            ),
          ),
        )
        .await;
    }

    WizardOutcome::Published
  }

  /// Prompts are best effort; a failed prompt never changes the outcome of a step.
  async fn notify(&self, chat: ChatId, embed: Embed) {
    if let Err(err) = self.messenger.send_embed(chat, &embed).await {
      warn!(error = %err, chat_id = %chat, title = %embed.title, "failed to send wizard message");
    }
  }
}

pub fn preview_embed(draft: &EmbedDraft, color: u32) -> Embed {
  Embed::info(draft.title.as_str(), draft.content.as_str()).with_color(color)
}
