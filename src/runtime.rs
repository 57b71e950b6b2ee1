//! Runtime services and shared state for the reply bot.

use tracing::instrument;

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    interaction::filter::EventFilter,
    service::{chat::ChatClient, history::HistoryClient, llm::LlmClient},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the event filter, history store, LLM client, chat
/// transport, and configuration. It is designed to be trivially cloneable,
/// allowing it to be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The inbound event filter (dedup + echo suppression).
    pub filter: EventFilter,
    /// The conversation history store.
    pub history: HistoryClient,
    /// The LLM client instance.
    pub llm: LlmClient,
    /// The Instagram chat client instance.
    pub chat: ChatClient,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the event filter.
        let filter = EventFilter::new(&config);

        // Initialize the history store.
        let history = HistoryClient::surreal(&config).await?;

        // Initialize the LLM client.
        let llm = LlmClient::gemini(&config);

        // Initialize the Instagram client.
        let chat = ChatClient::instagram(&config, filter.clone(), history.clone(), llm.clone())?;

        Ok(Self {
            config,
            filter,
            history,
            llm,
            chat,
        })
    }

    pub async fn start(&self) -> Void {
        self.chat.start().await
    }
}
