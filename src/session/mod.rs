//! Browser session state
//!
//! Each session owns its chat history, the agent registry built from its
//! credential, and the in-flight flag guarding a single running query.

use crate::agent::AgentRegistry;
use crate::models::ChatTurn;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub const EXPORT_FILE_NAME: &str = "chat_history.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// One-shot banner shown on the next render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

pub struct SessionState {
    id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    turns: Vec<ChatTurn>,
    registry: Option<Arc<AgentRegistry>>,
    in_flight: bool,
    /// Name of the agent behind the latest turn.
    latest_agent: Option<String>,
    /// Label last picked in the selector.
    pub selected_label: Option<String>,
    notice: Option<Notice>,
}

impl SessionState {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            turns: Vec::new(),
            registry: None,
            in_flight: false,
            latest_agent: None,
            selected_label: None,
            notice: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// History in insertion order.
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub(crate) fn push_turn(&mut self, agent_name: &str, turn: ChatTurn) {
        self.turns.push(turn);
        self.latest_agent = Some(agent_name.to_string());
        self.updated_at = Utc::now();
    }

    /// Latest turn with the name of the agent that answered it.
    pub fn latest(&self) -> Option<(&str, &ChatTurn)> {
        let agent = self.latest_agent.as_deref()?;
        self.turns.last().map(|turn| (agent, turn))
    }

    /// Time since the session was last used.
    pub fn idle_for(&self) -> Duration {
        (Utc::now() - self.updated_at).to_std().unwrap_or_default()
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn clear(&mut self) {
        self.turns = Vec::new();
        self.latest_agent = None;
        self.updated_at = Utc::now();
    }

    /// Plain-text transcript: `You:`/`AI:` pairs separated by blank lines.
    pub fn export_text(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("You: {}\nAI: {}", turn.query, turn.response))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight
    }

    /// Marks the session busy. Returns false when a query is already running.
    pub(crate) fn begin_processing(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub(crate) fn finish_processing(&mut self) {
        self.in_flight = false;
    }

    pub fn registry(&self) -> Option<Arc<AgentRegistry>> {
        self.registry.clone()
    }

    pub fn set_registry(&mut self, registry: Arc<AgentRegistry>) {
        self.registry = Some(registry);
    }

    pub fn flash(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }
}

/// Shared handle to one session's state.
#[derive(Clone)]
pub struct SessionHandle(Arc<Mutex<SessionState>>);

impl SessionHandle {
    pub fn new(state: SessionState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Never held across an await point.
    pub fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// All live sessions, keyed by the session cookie.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
    default_registry: Option<Arc<AgentRegistry>>,
    idle_timeout: Duration,
}

impl SessionStore {
    /// `default_registry` pre-authorizes new sessions (server-side credential).
    pub fn new(default_registry: Option<Arc<AgentRegistry>>, idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            default_registry,
            idle_timeout,
        }
    }

    /// Live session for `id`, or a fresh one under a newly minted id. Ids the
    /// store does not know, or whose session expired, are never adopted. The
    /// bool is true when created.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> (SessionHandle, bool) {
        if let Some(id) = id {
            let locked = self.sessions.read().await;
            if let Some(handle) = locked.get(&id) {
                let mut state = handle.lock();
                if !self.is_expired(&state) {
                    state.touch();
                    return (handle.clone(), false);
                }
            }
        }

        let mut locked = self.sessions.write().await;
        let before = locked.len();
        locked.retain(|_, handle| !self.is_expired(&handle.lock()));
        if locked.len() < before {
            debug!(expired = before - locked.len(), "Idle sessions dropped");
        }

        let id = Uuid::new_v4();
        let mut state = SessionState::new(id);
        if let Some(registry) = &self.default_registry {
            state.set_registry(Arc::clone(registry));
        }
        let handle = SessionHandle::new(state);
        locked.insert(id, handle.clone());
        debug!(session_id = %id, "Session created");

        (handle, true)
    }

    /// A running query keeps its session alive.
    fn is_expired(&self, state: &SessionState) -> bool {
        !state.is_processing() && state.idle_for() > self.idle_timeout
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_format() {
        let mut state = SessionState::new(Uuid::new_v4());
        state.push_turn("Simple Agent", ChatTurn::new("a", "r1"));
        state.push_turn("Simple Agent", ChatTurn::new("b", "r2"));

        assert_eq!(state.export_text(), "You: a\nAI: r1\n\nYou: b\nAI: r2");
    }

    #[test]
    fn test_export_has_one_block_per_turn() {
        let mut state = SessionState::new(Uuid::new_v4());
        assert_eq!(state.export_text(), "");

        for i in 0..7 {
            state.push_turn("Web Agent", ChatTurn::new(format!("q{}", i), format!("r{}", i)));
        }

        let export = state.export_text();
        let blocks: Vec<_> = export.split("\n\n").collect();
        assert_eq!(blocks.len(), 7);
        assert_eq!(blocks[0], "You: q0\nAI: r0");
        assert_eq!(blocks[6], "You: q6\nAI: r6");
        assert_eq!(export.matches("You: ").count(), 7);
    }

    #[test]
    fn test_clear_empties_history() {
        let mut state = SessionState::new(Uuid::new_v4());
        for i in 0..3 {
            state.push_turn("Web Agent", ChatTurn::new(format!("q{}", i), "r"));
        }
        assert_eq!(state.latest().unwrap().0, "Web Agent");

        state.clear();
        assert_eq!(state.len(), 0);
        assert!(state.latest().is_none());

        state.clear();
        assert!(state.is_empty());
    }

    #[test]
    fn test_single_in_flight() {
        let mut state = SessionState::new(Uuid::new_v4());
        assert!(state.begin_processing());
        assert!(!state.begin_processing());
        state.finish_processing();
        assert!(!state.is_processing());
        assert!(state.begin_processing());
    }

    #[test]
    fn test_notice_is_taken_once() {
        let mut state = SessionState::new(Uuid::new_v4());
        state.flash(Notice::warning("careful"));
        assert_eq!(state.take_notice(), Some(Notice::warning("careful")));
        assert_eq!(state.take_notice(), None);
    }

    #[tokio::test]
    async fn test_store_creates_lazily_and_reuses() {
        let store = SessionStore::new(None, Duration::from_secs(3600));
        let (first, created) = store.get_or_create(None).await;
        assert!(created);
        let id = first.lock().id();

        let (again, created) = store.get_or_create(Some(id)).await;
        assert!(!created);
        assert_eq!(again.lock().id(), id);

        let (unknown, created) = store.get_or_create(Some(Uuid::new_v4())).await;
        assert!(created);
        assert_ne!(unknown.lock().id(), id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_cookie_gets_fresh_id() {
        let store = SessionStore::new(None, Duration::from_secs(3600));

        let (session, created) = store.get_or_create(Some(Uuid::nil())).await;
        assert!(created);
        let id = session.lock().id();
        assert_ne!(id, Uuid::nil());

        let (again, created) = store.get_or_create(Some(Uuid::nil())).await;
        assert!(created);
        assert_ne!(again.lock().id(), id);
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let store = SessionStore::new(None, Duration::from_secs(60));
        let five_minutes_ago = Utc::now() - chrono::Duration::minutes(5);

        let (stale, _) = store.get_or_create(None).await;
        let stale_id = stale.lock().id();
        stale.lock().updated_at = five_minutes_ago;

        let (busy, _) = store.get_or_create(None).await;
        let busy_id = busy.lock().id();
        {
            let mut state = busy.lock();
            state.updated_at = five_minutes_ago;
            assert!(state.begin_processing());
        }

        store.get_or_create(None).await;
        assert_eq!(store.len().await, 2);

        let (_, created) = store.get_or_create(Some(stale_id)).await;
        assert!(created);
        let (_, created) = store.get_or_create(Some(busy_id)).await;
        assert!(!created);
    }

    #[tokio::test]
    async fn test_use_keeps_session_alive() {
        let store = SessionStore::new(None, Duration::from_secs(60));
        let (session, _) = store.get_or_create(None).await;
        let id = session.lock().id();

        session.lock().updated_at = Utc::now() - chrono::Duration::seconds(30);
        let (_, created) = store.get_or_create(Some(id)).await;
        assert!(!created);
        assert!(session.lock().idle_for() < Duration::from_secs(5));
    }
}
