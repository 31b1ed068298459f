use std::collections::HashMap;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use teloxide::types::ChatId;
use teloxide::types::UserId;
use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;
use tokio::sync::RwLock;

use crate::bot::embed::COLOR_INFO;

/// Ordinal position of a wizard session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WizardStep {
  Title = 0,
  Content = 1,
  Target = 2,
  ColorOrFinish = 3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardState {
  Title,
  Content { title: String },
  Target { title: String, content: String },
  ColorOrFinish(EmbedDraft),
}

impl WizardState {
  pub fn step(&self) -> WizardStep {
    match self {
      Self::Title => WizardStep::Title,
      Self::Content { .. } => WizardStep::Content,
      Self::Target { .. } => WizardStep::Target,
      Self::ColorOrFinish(_) => WizardStep::ColorOrFinish,
    }
  }
}

/// Everything needed to publish once a target has been accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedDraft {
  pub title: String,
  pub content: String,
  pub target: ChatId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardSession {
  pub user_id: UserId,
  pub workspace_id: ChatId,
  pub dm_chat: ChatId,
  pub color: u32,
  pub state: WizardState,
  pub touched_at: DateTime<Utc>,
}

impl WizardSession {
  pub fn new(user_id: UserId, workspace_id: ChatId, dm_chat: ChatId) -> Self {
    Self {
      user_id,
      workspace_id,
      dm_chat,
      color: COLOR_INFO,
      state: WizardState::Title,
      touched_at: Utc::now(),
    }
  }

  pub fn step(&self) -> WizardStep {
    self.state.step()
  }
}

type Slot = Arc<Mutex<WizardSession>>;

/// In-memory wizard sessions keyed by user.
///
/// The map sits behind a reader/writer lock; each session additionally has its own mutex
/// which [`SessionStore::lock`] holds for a whole wizard step, so two messages from the
/// same user are processed one after the other.
#[derive(Clone, Default)]
pub struct SessionStore {
  sessions: Arc<RwLock<HashMap<UserId, Slot>>>,
}

impl SessionStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Starts a fresh session, discarding any previous one for the same user.
  pub async fn start(&self, user_id: UserId, workspace_id: ChatId, dm_chat: ChatId) {
    let session = WizardSession::new(user_id, workspace_id, dm_chat);
    let mut sessions = self.sessions.write().await;
    sessions.insert(user_id, Arc::new(Mutex::new(session)));
  }

  pub async fn get(&self, user_id: UserId) -> Option<WizardSession> {
    let slot = self.sessions.read().await.get(&user_id).cloned()?;
    let session = slot.lock().await;
    Some(session.clone())
  }

  pub async fn remove(&self, user_id: UserId) -> bool {
    self.sessions.write().await.remove(&user_id).is_some()
  }

  pub async fn has_active(&self, user_id: UserId) -> bool {
    self.sessions.read().await.contains_key(&user_id)
  }

  pub async fn len(&self) -> usize {
    self.sessions.read().await.len()
  }

  /// Takes exclusive hold of a user's session.
  ///
  /// A session replaced or removed while we waited is never handed out; the current one
  /// is fetched again instead.
  pub async fn lock(&self, user_id: UserId) -> Option<SessionGuard> {
    loop {
      let slot = self.sessions.read().await.get(&user_id).cloned()?;
      let guard = slot.clone().lock_owned().await;
      let current = self
        .sessions
        .read()
        .await
        .get(&user_id)
        .is_some_and(|existing| Arc::ptr_eq(existing, &slot));
      if current {
        return Some(SessionGuard {
          store: self.clone(),
          slot,
          guard,
        });
      }
    }
  }

  /// Removes every session idle for longer than `max_idle` and returns them.
  pub async fn expire_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> Vec<WizardSession> {
    let mut sessions = self.sessions.write().await;
    let mut expired = Vec::new();
    let mut keys = Vec::new();

    for (user_id, slot) in sessions.iter() {
      // A session that is mid-step is active by definition.
      let Ok(session) = slot.try_lock() else {
        continue;
      };
      if now - session.touched_at > max_idle {
        keys.push(*user_id);
        expired.push(session.clone());
      }
    }

    for key in keys {
      sessions.remove(&key);
    }
    expired
  }

  async fn remove_slot(&self, user_id: UserId, slot: &Slot) -> bool {
    let mut sessions = self.sessions.write().await;
    let is_current = sessions
      .get(&user_id)
      .is_some_and(|existing| Arc::ptr_eq(existing, slot));
    if is_current {
      sessions.remove(&user_id);
    }
    is_current
  }
}

/// Exclusive access to one session for the duration of a step.
pub struct SessionGuard {
  store: SessionStore,
  slot: Slot,
  guard: OwnedMutexGuard<WizardSession>,
}

impl SessionGuard {
  pub fn session(&self) -> &WizardSession {
    &self.guard
  }

  pub fn session_mut(&mut self) -> &mut WizardSession {
    &mut self.guard
  }

  /// Ends the session. Only removes the map entry if it still refers to this session.
  pub async fn finish(self) -> bool {
    let user_id = self.guard.user_id;
    self.store.remove_slot(user_id, &self.slot).await
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;
  use chrono::Utc;
  use teloxide::types::ChatId;
  use teloxide::types::UserId;

  use super::SessionStore;
  use super::WizardState;
  use super::WizardStep;
  use crate::bot::embed::COLOR_INFO;

  const USER: UserId = UserId(7);
  const GROUP: ChatId = ChatId(-100);
  const DM: ChatId = ChatId(7);

  #[tokio::test]
  async fn start_creates_title_session_with_default_color() {
    let store = SessionStore::new();
    store.start(USER, GROUP, DM).await;

    let session = store.get(USER).await.expect("session");
    assert_eq!(session.step(), WizardStep::Title);
    assert_eq!(session.color, COLOR_INFO);
    assert_eq!(session.workspace_id, GROUP);
    assert!(store.has_active(USER).await);
  }

  #[tokio::test]
  async fn restarting_discards_previous_progress() {
    let store = SessionStore::new();
    store.start(USER, GROUP, DM).await;
    {
      let mut guard = store.lock(USER).await.expect("guard");
      guard.session_mut().state = WizardState::Content {
        title: "Hei".to_string(),
      };
    }
    store.start(USER, ChatId(-200), DM).await;

    let session = store.get(USER).await.expect("session");
    assert_eq!(session.state, WizardState::Title);
    assert_eq!(session.workspace_id, ChatId(-200));
    assert_eq!(store.len().await, 1);
  }

  #[tokio::test]
  async fn remove_is_idempotent() {
    let store = SessionStore::new();
    store.start(USER, GROUP, DM).await;
    assert!(store.remove(USER).await);
    assert!(!store.remove(USER).await);
    assert!(!store.has_active(USER).await);
    assert!(store.get(USER).await.is_none());
    assert!(store.lock(USER).await.is_none());
  }

  #[tokio::test]
  async fn finishing_a_replaced_session_keeps_the_new_one() {
    let store = SessionStore::new();
    store.start(USER, GROUP, DM).await;
    let guard = store.lock(USER).await.expect("guard");
    store.start(USER, ChatId(-300), DM).await;

    assert!(!guard.finish().await);
    let session = store.get(USER).await.expect("replacement survives");
    assert_eq!(session.workspace_id, ChatId(-300));
  }

  #[tokio::test]
  async fn lock_serializes_steps_for_one_user() {
    let store = SessionStore::new();
    store.start(USER, GROUP, DM).await;

    let mut first = store.lock(USER).await.expect("guard");
    let contender = {
      let store = store.clone();
      tokio::spawn(async move {
        let mut guard = store.lock(USER).await.expect("guard");
        let seen = guard.session().state.clone();
        guard.session_mut().state = WizardState::Target {
          title: "t".to_string(),
          content: "c".to_string(),
        };
        seen
      })
    };

    first.session_mut().state = WizardState::Content { title: "t".to_string() };
    drop(first);

    let seen = contender.await.expect("task");
    assert_eq!(seen, WizardState::Content { title: "t".to_string() });
    assert_eq!(store.get(USER).await.expect("session").step(), WizardStep::Target);
  }

  #[tokio::test]
  async fn expires_only_idle_sessions() {
    let store = SessionStore::new();
    store.start(USER, GROUP, DM).await;
    store.start(UserId(8), GROUP, ChatId(8)).await;
    {
      let mut guard = store.lock(USER).await.expect("guard");
      guard.session_mut().touched_at = Utc::now() - Duration::hours(2);
    }

    let expired = store.expire_idle(Utc::now(), Duration::hours(1)).await;
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].user_id, USER);
    assert!(!store.has_active(USER).await);
    assert!(store.has_active(UserId(8)).await);
  }
}
