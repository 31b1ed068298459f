use teloxide::utils::markdown;

use crate::util::color_swatch;

pub const COLOR_INFO: u32 = 0x3498db;
pub const COLOR_SUCCESS: u32 = 0x2ecc71;
pub const COLOR_WARNING: u32 = 0xf1c40f;
pub const COLOR_ERROR: u32 = 0xe74c3c;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
  Info,
  Success,
  Warning,
  Error,
}

impl EmbedKind {
  pub fn color(self) -> u32 {
    match self {
      Self::Info => COLOR_INFO,
      Self::Success => COLOR_SUCCESS,
      Self::Warning => COLOR_WARNING,
      Self::Error => COLOR_ERROR,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
  pub name: String,
  pub value: String,
}

/// A titled, coloured message with optional fields and footer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Embed {
  pub title: String,
  pub description: String,
  pub color: u32,
  pub fields: Vec<EmbedField>,
  pub footer: Option<String>,
}

impl Embed {
  pub fn new(title: impl Into<String>, description: impl Into<String>, kind: EmbedKind) -> Self {
    Self {
      title: title.into(),
      description: description.into(),
      color: kind.color(),
      fields: Vec::new(),
      footer: None,
    }
  }

  pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self::new(title, description, EmbedKind::Info)
  }

  pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self::new(title, description, EmbedKind::Success)
  }

  pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self::new(title, description, EmbedKind::Error)
  }

  pub fn with_color(mut self, color: u32) -> Self {
    self.color = color;
    self
  }

  pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.fields.push(EmbedField {
      name: name.into(),
      value: value.into(),
    });
    self
  }

  pub fn footer(mut self, footer: impl Into<String>) -> Self {
    self.footer = Some(footer.into());
    self
  }

  /// Renders the embed as MarkdownV2 messages that each fit within [`MAX_MESSAGE_LEN`].
  /// A small embed is a single message; a long one starts with the title and continues
  /// with the body split on character boundaries. Every piece of text is escaped.
  pub fn to_markdown_parts(&self) -> Vec<String> {
    self.parts().into_iter().map(|part| part.markdown).collect()
  }

  fn parts(&self) -> Vec<Part> {
    let mut parts: Vec<Part> = Vec::new();
    for block in self.blocks() {
      match parts.last_mut() {
        Some(last) if text_len(&last.plain) + 2 + text_len(&block.plain) <= MAX_MESSAGE_LEN => {
          last.plain.push_str("\n\n");
          last.plain.push_str(&block.plain);
          last.markdown.push_str("\n\n");
          last.markdown.push_str(&block.markdown);
        },
        _ => parts.push(block),
      }
    }
    parts
  }

  fn blocks(&self) -> Vec<Part> {
    let swatch = color_swatch(self.color);
    let mut blocks = Vec::new();

    if self.title.is_empty() {
      blocks.push(Part::new(swatch, swatch));
    } else {
      blocks.push(Part::new(
        format!("{swatch} {}", self.title),
        format!("{swatch} {}", markdown::bold(&markdown::escape(&self.title))),
      ));
    }

    for piece in split_text(&self.description, MAX_MESSAGE_LEN) {
      blocks.push(Part::new(piece, markdown::escape(piece)));
    }

    for field in &self.fields {
      let budget = MAX_MESSAGE_LEN.saturating_sub(text_len(&field.name) + 1).max(1);
      let pieces = split_text(&field.value, budget);
      let (first, rest) = pieces.split_first().map_or(("", &[][..]), |(first, rest)| (*first, rest));
      blocks.push(Part::new(
        format!("{}\n{first}", field.name),
        format!(
          "{}\n{}",
          markdown::bold(&markdown::escape(&field.name)),
          markdown::escape(first)
        ),
      ));
      for piece in rest {
        blocks.push(Part::new(*piece, markdown::escape(piece)));
      }
    }

    if let Some(footer) = &self.footer {
      blocks.push(Part::new(footer.as_str(), markdown::italic(&markdown::escape(footer))));
    }

    blocks
  }
}

/// Telegram's cap on message text, counted after entity parsing.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// One outgoing message: the text the user sees and its MarkdownV2 source.
#[derive(Debug)]
struct Part {
  plain: String,
  markdown: String,
}

impl Part {
  fn new(plain: impl Into<String>, markdown: impl Into<String>) -> Self {
    Self {
      plain: plain.into(),
      markdown: markdown.into(),
    }
  }
}

/// Length as Telegram counts it, in UTF-16 code units.
fn text_len(text: &str) -> usize {
  text.encode_utf16().count()
}

/// Splits `text` into pieces of at most `max` UTF-16 units without cutting a character.
fn split_text(text: &str, max: usize) -> Vec<&str> {
  let mut pieces = Vec::new();
  let mut start = 0;
  let mut len = 0;
  for (idx, ch) in text.char_indices() {
    let width = ch.len_utf16();
    if len + width > max && idx > start {
      pieces.push(&text[start .. idx]);
      start = idx;
      len = 0;
    }
    len += width;
  }
  if start < text.len() {
    pieces.push(&text[start ..]);
  }
  pieces
}

#[cfg(test)]
mod tests {
  use super::COLOR_ERROR;
  use super::COLOR_INFO;
  use super::Embed;
  use super::MAX_MESSAGE_LEN;
  use super::split_text;
  use super::text_len;

  #[test]
  fn builders_pick_kind_colours() {
    assert_eq!(Embed::info("a", "b").color, COLOR_INFO);
    assert_eq!(Embed::error("a", "b").color, COLOR_ERROR);
    assert_eq!(Embed::info("a", "b").with_color(0xff0000).color, 0xff0000);
  }

  #[test]
  fn renders_all_parts() {
    let embed = Embed::info("Tittel", "Innhald")
      .field("Ord", "hest")
      .footer("Kjelde: ordbøkene.no");
    let parts = embed.to_markdown_parts();
    assert_eq!(parts.len(), 1);
    let text = &parts[0];
    assert!(text.starts_with("🟦 *Tittel*"));
    assert!(text.contains("\n\nInnhald"));
    assert!(text.contains("*Ord*\nhest"));
    assert!(text.ends_with("_Kjelde: ordbøkene\\.no_"));
  }

  #[test]
  fn escapes_user_text() {
    let parts = Embed::info("a_b", "1.5 (x)").to_markdown_parts();
    assert!(parts[0].contains("a\\_b"));
    assert!(parts[0].contains("1\\.5 \\(x\\)"));
  }

  #[test]
  fn full_length_content_is_split_into_fitting_messages() {
    let embed = Embed::info("Hello", "a".repeat(4096)).footer("Laga av Askeladden");
    let parts = embed.parts();

    assert!(parts.len() > 1);
    for part in &parts {
      assert!(text_len(&part.plain) <= MAX_MESSAGE_LEN, "part of {} units", text_len(&part.plain));
    }
    assert!(parts[0].markdown.starts_with("🟦 *Hello*"));
    assert!(parts.iter().any(|part| part.plain == "a".repeat(4096)));
    assert!(parts.last().expect("footer").markdown.ends_with("_Laga av Askeladden_"));
  }

  #[test]
  fn escaped_and_wide_characters_stay_within_limit() {
    let dots = Embed::info("Punktum", ".".repeat(5000)).to_markdown_parts();
    assert_eq!(dots.iter().map(|part| part.matches("\\.").count()).sum::<usize>(), 5000);

    let embed = Embed::info("Tittel", "å😀".repeat(3000)).field("Ord", "x".repeat(5000));
    for part in embed.parts() {
      assert!(text_len(&part.plain) <= MAX_MESSAGE_LEN);
    }
  }

  #[test]
  fn splits_on_character_boundaries() {
    assert_eq!(split_text("abcde", 2), vec!["ab", "cd", "e"]);
    assert_eq!(split_text("😀😀", 3), vec!["😀", "😀"]);
    assert!(split_text("", 10).is_empty());
  }
}
