//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services used by the bot:
//! - Chat transport (Instagram webhook + Graph API send)
//! - Conversation history storage (SurrealDB)
//! - LLM services (Gemini)
//!
//! Each service module defines both generic traits and concrete
//! implementations, allowing for extensibility and easy testing.

pub mod chat;
pub mod history;
pub mod llm;
