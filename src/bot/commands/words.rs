use async_trait::async_trait;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use super::reply;
use crate::bot::HandlerResult;
use crate::bot::context::AppContext;
use crate::bot::embed::Embed;
use crate::bot::registry::CommandHandler;
use crate::bot::registry::Incoming;
use crate::dictionary::lookup_embed;

const CONTEXT_FOOTER: &str =
  "Dette er ein grunnleggjande analyse. For meir avansert hjelp, bruk ord-kommandoen eller spør i grammatikkchatten.";

/// Bokmål forms people often slip into, with their Nynorsk counterparts.
const BOKMAL_TO_NYNORSK: &[(&str, &str)] = &[
  ("ikke", "ikkje"),
  ("jeg", "eg"),
  ("det", "det/den"),
  ("som", "som"),
  ("en", "ein"),
  ("et", "eit"),
];

pub struct Lookup;

#[async_trait]
impl CommandHandler for Lookup {
  #[instrument(skip(self, ctx, msg), fields(user_id = msg.sender_id.0))]
  async fn handle(&self, ctx: &AppContext, msg: &Incoming) -> HandlerResult {
    let args = msg.args();
    if args.is_empty() {
      let prefix = &ctx.config().prefix;
      return reply(
        ctx,
        msg,
        Embed::error(
          "Manglande ord",
          format!("Bruk: {prefix}ord <ord> for å slå opp eit ord i ordbøkene.no"),
        ),
      )
      .await;
    }

    let word = args.join(" ");
    match ctx.dictionary().lookup(&word).await {
      Ok(info) => {
        info!(word = %info.word, found = info.found, "dictionary lookup finished");
        reply(ctx, msg, lookup_embed(&info)).await
      },
      Err(err) => {
        warn!(error = %err, word = %word, "dictionary lookup failed");
        reply(
          ctx,
          msg,
          Embed::error("Feil ved oppslag", "Det oppstod ein feil under oppslag av ordet."),
        )
        .await
      },
    }
  }
}

pub struct Context;

#[async_trait]
impl CommandHandler for Context {
  #[instrument(skip(self, ctx, msg), fields(user_id = msg.sender_id.0))]
  async fn handle(&self, ctx: &AppContext, msg: &Incoming) -> HandlerResult {
    let args = msg.args();
    if args.len() < 2 {
      let prefix = &ctx.config().prefix;
      return reply(
        ctx,
        msg,
        Embed::error(
          "Manglande parameter",
          format!(
            "Bruk: {prefix}kontekst <ord> <kontekst...>\nDøme: {prefix}kontekst huse I huset bur det mange folk\n\n\
             Dette sjekkar om ordet 'huse' er korrekt i konteksten 'I huset bur det mange folk'."
          ),
        ),
      )
      .await;
    }

    let word = args[0];
    let context = args[1 ..].join(" ");
    let verdict = analyze_word_in_context(word, &context, &ctx.config().prefix);
    let embed = Embed::info("🔍 Kontekstanalyse", "")
      .field("Ord", word)
      .field("Kontekst", context)
      .field("Vurdering", verdict)
      .footer(CONTEXT_FOOTER);
    reply(ctx, msg, embed).await
  }
}

/// Rule-based check of a word against the sentence it was used in.
pub fn analyze_word_in_context(word: &str, context: &str, prefix: &str) -> String {
  let word = word.trim().to_lowercase();
  let context = context.to_lowercase();

  if word.contains("og") && context.contains("og") {
    return "✅ Ordet 'og' er vanlegvis korrekt som bindeord.".to_string();
  }
  if word.contains('å') && context.contains('å') {
    return "✅ Infinitivsmerket 'å' ser ut til å vere brukt korrekt.".to_string();
  }
  if let Some((_, nynorsk)) = BOKMAL_TO_NYNORSK.iter().find(|(bokmal, _)| *bokmal == word) {
    return format!("⚠️ '{word}' er bokmål. På nynorsk: '{nynorsk}'");
  }
  if !context.contains(&word) {
    return "⚠️ Ordet er ikkje funne i konteksten. Sjekk at du har skrive rett.".to_string();
  }
  format!(
    "ℹ️ Ordet '{word}' treng nærmare vurdering. Bruk {prefix}ord {word} for ordbok-oppslag eller spør i \
     grammatikkchatten for hjelp."
  )
}

#[cfg(test)]
mod tests {
  use super::Context;
  use super::Lookup;
  use super::analyze_word_in_context;
  use crate::bot::registry::CommandHandler;
  use crate::bot::testing::GROUP;
  use crate::bot::testing::harness;
  use crate::bot::testing::incoming;
  use crate::config::Config;

  #[test]
  fn recognises_conjunction_and_infinitive_marker() {
    assert!(analyze_word_in_context("og", "eg og du", "?").starts_with("✅ Ordet 'og'"));
    assert!(analyze_word_in_context("å", "å lese er fint", "?").starts_with("✅ Infinitivsmerket"));
  }

  #[test]
  fn flags_bokmal_words() {
    assert_eq!(
      analyze_word_in_context("Ikke", "eg vil ikke", "?"),
      "⚠️ 'ikke' er bokmål. På nynorsk: 'ikkje'"
    );
    assert_eq!(
      analyze_word_in_context("jeg", "jeg er her", "?"),
      "⚠️ 'jeg' er bokmål. På nynorsk: 'eg'"
    );
  }

  #[test]
  fn reports_words_missing_from_context() {
    assert!(analyze_word_in_context("huse", "I huset bur det mange folk", "?").starts_with("ℹ️"));
    assert!(analyze_word_in_context("bil", "I huset bur det mange folk", "?").starts_with("⚠️ Ordet er ikkje funne"));
  }

  #[test]
  fn suggests_lookup_with_configured_prefix() {
    let verdict = analyze_word_in_context("hus", "eit stort hus", "!");
    assert!(verdict.contains("!ord hus"));
  }

  #[tokio::test]
  async fn context_requires_word_and_sentence() {
    let h = harness(Config::for_tests());
    Context.handle(&h.ctx, &incoming("?kontekst huse")).await.expect("handled");
    assert_eq!(h.messenger.last_embed(GROUP).expect("usage").title, "Manglande parameter");

    Context
      .handle(&h.ctx, &incoming("?kontekst jeg  jeg er her"))
      .await
      .expect("handled");
    let embed = h.messenger.last_embed(GROUP).expect("analysis");
    assert_eq!(embed.title, "🔍 Kontekstanalyse");
    let values: Vec<_> = embed.fields.iter().map(|field| field.value.as_str()).collect();
    assert_eq!(values[0], "jeg");
    assert_eq!(values[1], "jeg er her");
    assert!(values[2].contains("'eg'"));
  }

  #[tokio::test]
  async fn lookup_without_word_shows_usage() {
    let h = harness(Config::for_tests());
    Lookup.handle(&h.ctx, &incoming("?ord")).await.expect("handled");
    assert_eq!(h.messenger.last_embed(GROUP).expect("usage").title, "Manglande ord");
  }
}
