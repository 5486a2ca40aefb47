use std::collections::HashMap;
use tokio::sync::RwLock;
use uigen_llm::provider::{ChatMessage, Role};
use uuid::Uuid;

/// Per-session conversation history. Read before a turn runs, written after.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// History for a session, oldest first. Unknown sessions are empty.
    async fn load(&self, session_id: &str) -> Vec<ChatMessage>;
    async fn append(&self, session_id: &str, messages: Vec<ChatMessage>);
}

/// Fresh random session id.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Process-local store. Keeps at most the most recent `limit` messages per
/// session, and the kept history always opens on a user message.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<ChatMessage>>>,
    limit: usize,
}

impl InMemorySessionStore {
    pub fn new(limit: usize) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), limit }
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Vec<ChatMessage> {
        self.sessions.read().await.get(session_id).cloned().unwrap_or_default()
    }

    async fn append(&self, session_id: &str, messages: Vec<ChatMessage>) {
        let mut sessions = self.sessions.write().await;
        let history = sessions.entry(session_id.to_string()).or_default();
        history.extend(messages);
        if history.len() > self.limit {
            let excess = history.len() - self.limit;
            history.drain(..excess);
            let start = history.iter().position(|m| m.role == Role::User).unwrap_or(history.len());
            history.drain(..start);
        }
        tracing::debug!(session_id, len = history.len(), "session history updated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_session_is_empty() {
        let store = InMemorySessionStore::new(10);
        assert!(store.load("nope").await.is_empty());
    }

    #[tokio::test]
    async fn append_then_load_in_order() {
        let store = InMemorySessionStore::new(10);
        store.append("a", vec![ChatMessage::user("q1"), ChatMessage::assistant("r1")]).await;
        store.append("a", vec![ChatMessage::user("q2")]).await;
        let history = store.load("a").await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[2], ChatMessage::user("q2"));
        assert!(store.load("b").await.is_empty());
    }

    #[tokio::test]
    async fn keeps_only_the_most_recent_messages() {
        let store = InMemorySessionStore::new(2);
        store
            .append("a", vec![ChatMessage::user("1"), ChatMessage::user("2"), ChatMessage::user("3")])
            .await;
        assert_eq!(store.load("a").await, vec![ChatMessage::user("2"), ChatMessage::user("3")]);
    }

    #[tokio::test]
    async fn odd_limit_never_leaves_a_leading_assistant_message() {
        let store = InMemorySessionStore::new(3);
        store.append("a", vec![ChatMessage::user("q1"), ChatMessage::assistant("r1")]).await;
        store.append("a", vec![ChatMessage::user("q2"), ChatMessage::assistant("r2")]).await;

        let history = store.load("a").await;
        assert_eq!(history, vec![ChatMessage::user("q2"), ChatMessage::assistant("r2")]);
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(new_session_id(), new_session_id());
    }
}
