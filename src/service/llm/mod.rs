pub mod gemini;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{ConversationTurn, Res};

// Traits.

/// Generic LLM client trait that clients must implement.
///
/// This trait defines the core functionality for generating replies with a
/// hosted model. Implementing this trait allows different LLM providers to
/// be used with the reply bot.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Generate a reply to a user message.
    ///
    /// `history` carries the prior turns of that user's conversation, oldest
    /// first; the new message is passed separately and is not part of it.
    async fn generate_reply(&self, user_id: &str, text: &str, history: &[ConversationTurn]) -> Res<String>;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for
/// `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self { inner }
    }
}
