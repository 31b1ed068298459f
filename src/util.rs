use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static HEX_COLOR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#([0-9a-fA-F]{6})$").expect("valid regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorError {
  #[error("colour must start with #")]
  MissingHash,
  #[error("colour must match #rrggbb format")]
  InvalidFormat,
}

/// Parses a `#rrggbb` token into a 24-bit colour value.
pub fn parse_hex_color(input: &str) -> Result<u32, ColorError> {
  let trimmed = input.trim();
  if !trimmed.starts_with('#') {
    return Err(ColorError::MissingHash);
  }

  let digits = HEX_COLOR_PATTERN
    .captures(trimmed)
    .and_then(|caps| caps.get(1))
    .ok_or(ColorError::InvalidFormat)?;

  u32::from_str_radix(digits.as_str(), 16).map_err(|_| ColorError::InvalidFormat)
}

pub fn format_hex_color(color: u32) -> String {
  format!("#{:06x}", color & 0x00ff_ffff)
}

const SWATCHES: [(u32, &str); 9] = [
  (0xe74c3c, "🟥"),
  (0xe67e22, "🟧"),
  (0xf1c40f, "🟨"),
  (0x2ecc71, "🟩"),
  (0x3498db, "🟦"),
  (0x9b59b6, "🟪"),
  (0x8b5a2b, "🟫"),
  (0x111111, "⬛"),
  (0xf5f5f5, "⬜"),
];

/// Telegram has no accent colours, so the closest square emoji stands in for one.
pub fn color_swatch(color: u32) -> &'static str {
  let (r, g, b) = split_rgb(color);
  SWATCHES
    .iter()
    .min_by_key(|(swatch, _)| {
      let (sr, sg, sb) = split_rgb(*swatch);
      let dr = i64::from(r) - i64::from(sr);
      let dg = i64::from(g) - i64::from(sg);
      let db = i64::from(b) - i64::from(sb);
      dr * dr + dg * dg + db * db
    })
    .map(|(_, emoji)| *emoji)
    .unwrap_or("⬜")
}

fn split_rgb(color: u32) -> (u8, u8, u8) {
  (
    ((color >> 16) & 0xff) as u8,
    ((color >> 8) & 0xff) as u8,
    (color & 0xff) as u8,
  )
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
  if text.chars().count() <= max_chars {
    return text.to_string();
  }

  let truncated: String = text.chars().take(max_chars).collect();
  format!("{truncated}...")
}

/// Cuts a byte buffer down to at most `max_bytes` without splitting a UTF-8 sequence.
pub fn truncate_at_boundary(text: &str, max_bytes: usize) -> &str {
  if text.len() <= max_bytes {
    return text;
  }
  let mut end = max_bytes;
  while end > 0 && !text.is_char_boundary(end) {
    end -= 1;
  }
  &text[.. end]
}
