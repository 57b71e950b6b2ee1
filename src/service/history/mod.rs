pub mod surreal;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{ConversationTurn, Res, Role, Void};

// Traits.

/// Generic conversation store trait that clients must implement.
///
/// This trait defines the core functionality for keeping per-user
/// conversation logs. Implementing this trait allows different storage
/// backends to be used with the reply bot.
#[async_trait]
pub trait GenericHistoryStore: Send + Sync + 'static {
    /// Append a turn to a user's conversation.
    ///
    /// The log is append-only; nothing is mutated or dropped except through
    /// an explicit reset.
    async fn append(&self, user_id: &str, role: Role, content: &str) -> Void;

    /// The most recent turns of a user's conversation, oldest first.
    ///
    /// This provides the context window handed to the reply model.
    async fn recent(&self, user_id: &str, limit: usize) -> Res<Vec<ConversationTurn>>;

    /// Drop a user's conversation entirely.
    async fn reset(&self, user_id: &str) -> Void;
}

// Structs.

/// Conversation store for the application.
///
/// This is trivially cloneable and can be passed around without the need for
/// `Arc` or `Mutex`.
#[derive(Clone)]
pub struct HistoryClient {
    inner: Arc<dyn GenericHistoryStore>,
}

impl Deref for HistoryClient {
    type Target = dyn GenericHistoryStore;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl HistoryClient {
    pub fn new(inner: Arc<dyn GenericHistoryStore>) -> Self {
        Self { inner }
    }
}
