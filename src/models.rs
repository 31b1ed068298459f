#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
  pub question: String,
  pub author_id: i64,
  pub author_name: String,
  pub message_id: i32,
  pub channel_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
  Opplysar,
  Rettskrivar,
}

impl Role {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_lowercase().as_str() {
      "opplysar" => Some(Self::Opplysar),
      "rettskrivar" => Some(Self::Rettskrivar),
      _ => None,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Opplysar => "opplysar",
      Self::Rettskrivar => "rettskrivar",
    }
  }
}
