//! Conversation Sessions
//!
//! Multi-turn chat on top of the completion adapter. Histories live in the
//! injected keyed store, start with the configured system prompt and keep at
//! most `memory_limit` turns after it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use super::adapter::ChatCompletionAdapter;
use super::provider::{ChatMessage, ChatProvider, ChatRole, CompletionRequest};
use crate::core::config::ChatSettings;
use crate::core::store::KeyedStore;
use crate::core::{CoreError, CoreResult, ProviderId};

/// Reply to a conversation turn
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationReply {
    pub conversation_id: String,
    pub text: String,
    pub provider: ProviderId,
}

/// Stateful chat sessions
pub struct ConversationService {
    adapter: Arc<ChatCompletionAdapter>,
    store: Arc<dyn KeyedStore<Vec<ChatMessage>>>,
    system_prompt: String,
    memory_limit: usize,
    /// One lock per conversation with a turn in flight
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationService {
    pub fn new(
        adapter: Arc<ChatCompletionAdapter>,
        store: Arc<dyn KeyedStore<Vec<ChatMessage>>>,
        settings: &ChatSettings,
    ) -> Self {
        Self {
            adapter,
            store,
            system_prompt: settings.system_prompt.clone(),
            memory_limit: settings.memory_limit,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Stored history for a conversation, empty when unknown
    pub async fn history(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.store.get(conversation_id).await.unwrap_or_default()
    }

    /// Sends one user turn to `backend`.
    ///
    /// Starts a new conversation when `conversation_id` is `None` or unknown.
    /// Turns on the same conversation run one at a time, and history is only
    /// written back once the provider has replied.
    pub async fn send(
        &self,
        conversation_id: Option<&str>,
        backend: &dyn ChatProvider,
        message: &str,
    ) -> CoreResult<ConversationReply> {
        if message.trim().is_empty() {
            return Err(CoreError::ValidationError("Message is empty".to_string()));
        }

        let conversation_id = conversation_id
            .map(str::to_string)
            .unwrap_or_else(|| ulid::Ulid::new().to_string());

        let lock = self.turn_lock(&conversation_id).await;
        let result = {
            let _turn = lock.lock().await;
            self.run_turn(&conversation_id, backend, message).await
        };
        drop(lock);
        self.release_turn_lock(&conversation_id).await;

        let text = result?;
        Ok(ConversationReply {
            conversation_id,
            text,
            provider: backend.id(),
        })
    }

    async fn run_turn(
        &self,
        conversation_id: &str,
        backend: &dyn ChatProvider,
        message: &str,
    ) -> CoreResult<String> {
        let mut history = match self.store.get(conversation_id).await {
            Some(history) => history,
            None => {
                debug!("Starting conversation {}", conversation_id);
                vec![ChatMessage::system(self.system_prompt.clone())]
            }
        };

        history.push(ChatMessage::user(message));
        let response = self
            .adapter
            .send_to(backend, CompletionRequest::new(history.clone()))
            .await?;

        history.push(ChatMessage::assistant(response.text.clone()));
        self.trim(&mut history);
        self.store.put(conversation_id, history).await;
        Ok(response.text)
    }

    async fn turn_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        Arc::clone(locks.entry(conversation_id.to_string()).or_default())
    }

    /// Drops the lock entry once no other turn holds or awaits it
    async fn release_turn_lock(&self, conversation_id: &str) {
        let mut locks = self.turn_locks.lock().await;
        if locks
            .get(conversation_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(conversation_id);
        }
    }

    /// Forgets a conversation. Returns whether it existed.
    pub async fn clear(&self, conversation_id: &str) -> bool {
        self.store.delete(conversation_id).await.is_some()
    }

    /// Keeps a leading system prompt plus the newest `memory_limit` turns
    fn trim(&self, history: &mut Vec<ChatMessage>) {
        let pinned = usize::from(
            history
                .first()
                .map(|m| m.role == ChatRole::System)
                .unwrap_or(false),
        );
        let turns = history.len() - pinned;
        if turns > self.memory_limit {
            history.drain(pinned..pinned + (turns - self.memory_limit));
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
