use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::Url;
use thiserror::Error;
use tracing::info;
use tracing::instrument;

use crate::bot::embed::Embed;
use crate::bot::embed::EmbedKind;
use crate::util::truncate_at_boundary;
use crate::util::truncate_chars;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BODY_BYTES: usize = 50_000;
const MAX_DEFINITION_CHARS: usize = 200;
const MAX_FORMS: usize = 5;
const MAX_FORM_BYTES: usize = 50;
const SOURCE_FOOTER: &str = "Kjelde: ordbøkene.no";

static DEFINITION_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
  [
    Regex::new(r#"(?i)<div[^>]*class="[^"]*definition[^"]*"[^>]*>(.*?)</div>"#).expect("valid regex"),
    Regex::new(r#"(?i)<div[^>]*class="[^"]*meaning[^"]*"[^>]*>(.*?)</div>"#).expect("valid regex"),
  ]
});

static INFLECTION_PATTERNS: Lazy<[Regex; 4]> = Lazy::new(|| {
  [
    Regex::new(r#"(?i)<div[^>]*class="[^"]*bøying[^"]*"[^>]*>(.*?)</div>"#).expect("valid regex"),
    Regex::new(r#"(?i)<div[^>]*class="[^"]*inflection[^"]*"[^>]*>(.*?)</div>"#).expect("valid regex"),
    Regex::new(r#"(?i)<div[^>]*class="[^"]*conjugation[^"]*"[^>]*>(.*?)</div>"#).expect("valid regex"),
    Regex::new(r#"(?i)<span[^>]*class="[^"]*bøying[^"]*"[^>]*>(.*?)</span>"#).expect("valid regex"),
  ]
});

static FORM_BLOCK_PATTERN: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"(?i)(<table[^>]*>.*?</table>|<ul[^>]*>.*?</ul>|<ol[^>]*>.*?</ol>)").expect("valid regex")
});

static FORM_CELL_PATTERN: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)<(?:td|li)[^>]*>(.*?)</(?:td|li)>").expect("valid regex"));

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static WHITESPACE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Error)]
pub enum DictionaryError {
  #[error("invalid dictionary url: {0}")]
  InvalidUrl(String),
  #[error("dictionary request failed: {0}")]
  Http(#[from] reqwest::Error),
}

/// Result of a lookup. `found` is false when the page had nothing usable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordInfo {
  pub word: String,
  pub definition: Option<String>,
  pub inflection: Option<String>,
  pub url: Option<String>,
  pub found: bool,
  pub error: Option<String>,
}

impl WordInfo {
  fn not_found(word: &str, url: Option<String>, error: impl Into<String>) -> Self {
    Self {
      word: word.to_string(),
      url,
      found: false,
      error: Some(error.into()),
      ..Self::default()
    }
  }
}

/// Best-effort scraper for the Nynorsk pages of ordbøkene.no.
#[derive(Clone)]
pub struct DictionaryClient {
  client: Client,
  base_url: Url,
}

impl DictionaryClient {
  pub fn new(base_url: &str) -> Result<Self, DictionaryError> {
    let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    Ok(Self {
      client,
      base_url: Url::parse(base_url).map_err(|err| DictionaryError::InvalidUrl(err.to_string()))?,
    })
  }

  pub fn word_url(&self, word: &str) -> Url {
    let mut url = self.base_url.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
      segments.pop_if_empty().extend(["nob", "nn", word]);
    }
    url
  }

  #[instrument(skip(self))]
  pub async fn lookup(&self, word: &str) -> Result<WordInfo, DictionaryError> {
    let clean = word.trim().to_lowercase();
    if clean.is_empty() {
      return Ok(WordInfo::not_found(word, None, "Tomt ord"));
    }

    let url = self.word_url(&clean);
    info!(word = %clean, url = %url, "looking up word");
    let response = self.client.get(url.clone()).send().await?;
    if response.status() != StatusCode::OK {
      return Ok(WordInfo::not_found(
        word,
        Some(url.to_string()),
        format!("HTTP-feil: {}", response.status().as_u16()),
      ));
    }

    let body = response.text().await?;
    Ok(parse_page(&clean, url.as_str(), truncate_at_boundary(&body, MAX_BODY_BYTES)))
  }
}

/// Extracts definition and inflection from a dictionary page.
pub fn parse_page(word: &str, url: &str, html: &str) -> WordInfo {
  let definition = extract_definition(html);
  let inflection = extract_inflection(html);
  if definition.is_none() && inflection.is_none() {
    return WordInfo::not_found(word, Some(url.to_string()), "Ordet vart ikkje funne i ordbøkene");
  }

  WordInfo {
    word: word.to_string(),
    definition,
    inflection,
    url: Some(url.to_string()),
    found: true,
    error: None,
  }
}

fn extract_definition(html: &str) -> Option<String> {
  DEFINITION_PATTERNS.iter().find_map(|pattern| {
    let captured = pattern.captures(html)?.get(1)?;
    Some(truncate_chars(&clean_html(captured.as_str()), MAX_DEFINITION_CHARS))
  })
}

fn extract_inflection(html: &str) -> Option<String> {
  let direct = INFLECTION_PATTERNS.iter().find_map(|pattern| {
    let captured = pattern.captures(html)?.get(1)?;
    let text = clean_html(captured.as_str());
    (!text.is_empty()).then_some(text)
  });
  if direct.is_some() {
    return direct;
  }

  FORM_BLOCK_PATTERN
    .find_iter(html)
    .map(|block| block.as_str())
    .filter(|block| block.to_lowercase().contains("bøy"))
    .find_map(extract_word_forms)
}

fn extract_word_forms(block: &str) -> Option<String> {
  let forms: Vec<String> = FORM_CELL_PATTERN
    .captures_iter(block)
    .filter_map(|cell| cell.get(1))
    .map(|cell| clean_html(cell.as_str()))
    .filter(|form| !form.is_empty() && form.len() < MAX_FORM_BYTES)
    .take(MAX_FORMS)
    .collect();
  (!forms.is_empty()).then(|| forms.join(", "))
}

/// Strips tags, collapses whitespace and decodes the handful of entities the site uses.
pub fn clean_html(html: &str) -> String {
  let text = TAG_PATTERN.replace_all(html, "");
  let text = WHITESPACE_PATTERN.replace_all(&text, " ");
  text
    .trim()
    .replace("&nbsp;", " ")
    .replace("&amp;", "&")
    .replace("&lt;", "<")
    .replace("&gt;", ">")
    .replace("&quot;", "\"")
}

pub fn lookup_embed(info: &WordInfo) -> Embed {
  if !info.found {
    let error = info.error.as_deref().unwrap_or("Ukjend feil");
    return Embed::new(
      "📚 Ordoppslag",
      format!("Ord: {}\n\n❌ {error}", info.word),
      EmbedKind::Error,
    )
    .footer(SOURCE_FOOTER);
  }

  let mut description = format!("Ord: {}", info.word);
  if let Some(url) = &info.url {
    description.push_str(&format!("\n\nSjå på ordbøkene.no: {url}"));
  }
  let mut embed = Embed::success("📚 Ordoppslag", description).footer(SOURCE_FOOTER);
  if let Some(definition) = &info.definition {
    embed = embed.field("📖 Tyding", definition);
  }
  if let Some(inflection) = &info.inflection {
    embed = embed.field("🔄 Bøying", inflection);
  }
  embed
}
