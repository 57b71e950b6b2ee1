//! Library root for `reply-bot`.
//!
//! Reply-bot is a Gemini-powered auto-responder for Instagram direct messages designed to:
//! - Receive DM webhook events and weed out echoes, duplicates, and read receipts
//! - Keep a per-user conversation history for model context
//! - Generate short, in-persona replies with a hosted model
//! - Relay replies back through the Instagram messaging API
//!
//! The bot integrates with Instagram for chat, SurrealDB for storage,
//! and Gemini for generated responses. The architecture is built around
//! extensible traits that allow for different implementations of each service.

#[deny(missing_docs)]
pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the reply-bot runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with the filter, history, LLM, and chat clients
/// - Starts the webhook server that feeds the event loop
pub async fn start(config: Config) -> Void {
    info!("Starting reply-bot ...");

    // Start the crypto provider.
    crypto::ring::default_provider().install_default().unwrap();

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
