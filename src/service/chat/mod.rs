pub mod instagram;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{Res, Void};

// Traits.

/// Generic "chat" trait that messaging transports must implement.
///
/// This trait defines the core functionality for a direct-message platform
/// like Instagram. Implementing this trait allows different messaging
/// services to be used with the reply bot.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Start the inbound side of the transport.
    ///
    /// For webhook-based platforms this runs the HTTP server that receives
    /// events and dispatches them into the bot.
    async fn start(&self) -> Void;

    /// Send a text message to a user.
    ///
    /// Returns the provider-assigned message id when the API reports one;
    /// callers use it to suppress the eventual echo of their own send.
    async fn send_message(&self, recipient_id: &str, text: &str) -> Res<Option<String>>;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}
