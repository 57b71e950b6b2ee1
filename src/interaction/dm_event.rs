use tracing::{Instrument, error, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        prompts,
        types::{InboundEvent, Res, Role, Void},
    },
    interaction::filter::EventFilter,
    service::{chat::ChatClient, history::HistoryClient, llm::LlmClient},
};

/// Handle an inbound DM event that passed the filter.
///
/// Spawns a task so the webhook response is never held up by reply
/// generation or the outbound send.
#[instrument(skip_all)]
pub fn handle_dm_event(event: InboundEvent, config: Config, filter: EventFilter, history: HistoryClient, llm: LlmClient, chat: ChatClient) {
    tokio::spawn(async move {
        // Process the event.
        let result = handle_dm_event_internal(event, &config, &filter, &history, &llm, &chat).in_current_span().await;

        // Log any errors.
        if let Err(err) = &result {
            error!("Error while handling: {}", err);
        }
    });
}

#[instrument(skip_all)]
async fn handle_dm_event_internal(event: InboundEvent, config: &Config, filter: &EventFilter, history: &HistoryClient, llm: &LlmClient, chat: &ChatClient) -> Void {
    let sender_id = &event.sender_id;
    let text = resolve_prompt_text(&event);

    // Commands short-circuit reply generation entirely.
    if let Some(reply) = handle_command(&text, sender_id, history).await? {
        send_and_track(chat, filter, sender_id, &reply).await;
        return Ok(());
    }

    info!("Message from {sender_id}.");

    // The prior turns become the model's context; the new message is handed
    // over separately, then both sides of the exchange are persisted.
    let turns = history.recent(sender_id, config.history_limit).await?;
    history.append(sender_id, Role::User, &text).await?;

    // The webhook was already acknowledged, so a generation failure degrades
    // to the static fallback instead of surfacing anywhere.
    let reply = match llm.generate_reply(sender_id, &text, &turns).await {
        Ok(reply) => reply,
        Err(err) => {
            warn!("Reply generation failed, using fallback: {err}");
            config.fallback_reply.clone()
        }
    };

    history.append(sender_id, Role::Assistant, &reply).await?;
    send_and_track(chat, filter, sender_id, &reply).await;

    Ok(())
}

/// Intercept slash commands; returns the canned reply when one matched.
async fn handle_command(text: &str, sender_id: &str, history: &HistoryClient) -> Res<Option<String>> {
    match text.trim().to_lowercase().as_str() {
        "/reset" | "/clear" | "reset chat" => {
            info!("Resetting conversation for {sender_id}.");
            history.reset(sender_id).await?;
            Ok(Some(prompts::RESET_REPLY.to_string()))
        }
        "/help" | "/commands" => Ok(Some(prompts::HELP_REPLY.to_string())),
        _ => Ok(None),
    }
}

/// The text handed to the reply model: message text when present, otherwise
/// a placeholder describing the attachments.
fn resolve_prompt_text(event: &InboundEvent) -> String {
    match event.text.as_deref() {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => format!("[user sent: {}]", event.attachments.join(", ")),
    }
}

/// Send a reply and record its id so the webhook echo of it is suppressed.
///
/// Sends are not retried; on failure the user simply gets no reply for this
/// event, and the webhook response is unaffected either way.
async fn send_and_track(chat: &ChatClient, filter: &EventFilter, recipient_id: &str, text: &str) {
    match chat.send_message(recipient_id, text).await {
        Ok(Some(message_id)) => filter.register_sent(&message_id),
        Ok(None) => warn!("Send reported no message id; echo suppression relies on the echo flag."),
        Err(err) => error!("Failed to send reply to {recipient_id}: {err}"),
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_text_prefers_message_text() {
        let event = InboundEvent {
            text: Some("hello".to_string()),
            attachments: vec!["image".to_string()],
            ..Default::default()
        };

        assert_eq!(resolve_prompt_text(&event), "hello");
    }

    #[test]
    fn prompt_text_describes_attachments() {
        let event = InboundEvent {
            attachments: vec!["image".to_string(), "video".to_string()],
            ..Default::default()
        };

        assert_eq!(resolve_prompt_text(&event), "[user sent: image, video]");
    }
}
