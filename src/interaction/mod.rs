//! Event filtering and DM handling for the reply bot.
//!
//! This module decides what happens to each inbound webhook event:
//! - Classifying events (echoes, duplicates, self-messages, receipts)
//! - Turning processable messages into generated replies and sends

pub mod dm_event;
pub mod filter;
