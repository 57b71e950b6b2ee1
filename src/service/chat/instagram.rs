//! Chat transport for Instagram direct messages.
//!
//! This module provides both sides of the Instagram integration:
//! - The inbound webhook server (subscription verification, signed event
//!   delivery, payload parsing, event filtering and dispatch)
//! - The outbound Graph API client for sending replies
//!
//! Inbound events are normalized into `InboundEvent` and run through the
//! `EventFilter` before anything else happens; the webhook always responds
//! promptly so the platform does not redeliver.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{Action, InboundEvent, Res, Void},
    },
    interaction,
    interaction::filter::EventFilter,
    service::{history::HistoryClient, llm::LlmClient},
};

use super::{ChatClient, GenericChatClient};

// Type aliases.

type HmacSha256 = Hmac<Sha256>;

// Extra methods on `ChatClient` applied by the instagram implementation.

impl ChatClient {
    /// Creates a new Instagram chat client.
    pub fn instagram(config: &Config, filter: EventFilter, history: HistoryClient, llm: LlmClient) -> Res<Self> {
        let client = InstagramChatClient::new(config, filter, history, llm)?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<InstagramChatClient> for ChatClient {
    fn from(client: InstagramChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

// Structs.

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    pub config: Config,
    pub filter: EventFilter,
    pub history: HistoryClient,
    pub llm: LlmClient,
    pub chat: ChatClient,
}

/// Instagram client implementation.
#[derive(Clone)]
struct InstagramChatClient {
    config: Config,
    http: reqwest::Client,
    filter: EventFilter,
    history: HistoryClient,
    llm: LlmClient,
}

impl InstagramChatClient {
    /// Create a new Instagram chat client.
    #[instrument(name = "InstagramChatClient::new", skip_all)]
    fn new(config: &Config, filter: EventFilter, history: HistoryClient, llm: LlmClient) -> Res<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(config.http_timeout_secs)).build()?;

        Ok(Self {
            config: config.clone(),
            http,
            filter,
            history,
            llm,
        })
    }
}

#[async_trait::async_trait]
impl GenericChatClient for InstagramChatClient {
    async fn start(&self) -> Void {
        let state = WebhookState {
            config: self.config.clone(),
            filter: self.filter.clone(),
            history: self.history.clone(),
            llm: self.llm.clone(),
            chat: ChatClient::from(self.clone()),
        };

        let router = webhook_router(state);
        let listener = tokio::net::TcpListener::bind(&self.config.listen_addr).await?;

        info!("Webhook server listening on {}", self.config.listen_addr);

        axum::serve(listener, router).await?;

        Ok(())
    }

    #[instrument(skip(self, text))]
    async fn send_message(&self, recipient_id: &str, text: &str) -> Res<Option<String>> {
        let url = format!("{}/me/messages", self.config.graph_api_url);

        let payload = serde_json::json!({
            "recipient": { "id": recipient_id },
            "message": { "text": text },
        });

        let response = self
            .http
            .post(&url)
            .query(&[("access_token", self.config.instagram_access_token.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Failed to send message: HTTP {status}: {body}"));
        }

        let receipt = response.json::<SendResponse>().await?;

        info!("Message sent to {recipient_id}.");

        Ok(receipt.message_id)
    }
}

/// Response body of the Graph API send call.
#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: Option<String>,
}

// Webhook routes.

/// Build the webhook router over the given state.
pub fn webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .with_state(state)
}

/// Status route.
async fn home(State(state): State<WebhookState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "running",
        "bot": state.config.bot_name,
    }))
}

/// Webhook subscription verification (GET).
///
/// The platform sends `hub.mode=subscribe`, `hub.verify_token` and
/// `hub.challenge`; the challenge is echoed back when the token matches.
#[instrument(skip_all)]
async fn verify_webhook(State(state): State<WebhookState>, Query(params): Query<HashMap<String, String>>) -> (StatusCode, String) {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge").map(String::as_str);

    match verify_subscription(mode, token, challenge, &state.config.verify_token) {
        Some(challenge) => {
            info!("Webhook verified.");
            (StatusCode::OK, challenge)
        }
        None => {
            warn!("Webhook verification failed.");
            (StatusCode::FORBIDDEN, "Forbidden".to_string())
        }
    }
}

/// Webhook event delivery (POST).
///
/// Signature enforcement, payload parsing, entry filtering, and dispatch.
/// Well-formed payloads always get a prompt `200` so the platform does not
/// retry, independent of what happens downstream.
#[instrument(skip_all)]
async fn receive_webhook(State(state): State<WebhookState>, headers: HeaderMap, body: Bytes) -> (StatusCode, &'static str) {
    if !state.config.instagram_app_secret.is_empty()
        && let Some(signature) = headers.get("x-hub-signature-256")
    {
        let signature = signature.to_str().unwrap_or_default();
        if !verify_signature(&body, signature, &state.config.instagram_app_secret) {
            warn!("Webhook signature mismatch.");
            return (StatusCode::FORBIDDEN, "Invalid signature");
        }
    }

    let Ok(payload) = serde_json::from_slice::<WebhookPayload>(&body) else {
        return (StatusCode::BAD_REQUEST, "Bad Request");
    };

    if payload.object != "instagram" {
        debug!("Ignoring webhook for object {:?}.", payload.object);
        return (StatusCode::OK, "OK");
    }

    for entry in payload.entry {
        // The same delivery can carry entries for other linked accounts.
        if entry.id != state.config.bot_page_id {
            debug!("Skipping entry for non-bot account {}.", entry.id);
            continue;
        }

        for messaging in entry.messaging {
            let event = InboundEvent::from(messaging);

            match state.filter.decide(&event) {
                Action::Process => {
                    interaction::dm_event::handle_dm_event(
                        event,
                        state.config.clone(),
                        state.filter.clone(),
                        state.history.clone(),
                        state.llm.clone(),
                        state.chat.clone(),
                    );
                }
                action => debug!("Ignoring event: {action:?}."),
            }
        }
    }

    (StatusCode::OK, "OK")
}

/// Check subscription-verification query parameters against the configured
/// token, returning the challenge to echo on success.
pub fn verify_subscription(mode: Option<&str>, token: Option<&str>, challenge: Option<&str>, expected_token: &str) -> Option<String> {
    if mode? == "subscribe" && token? == expected_token {
        Some(challenge?.to_string())
    } else {
        None
    }
}

/// Check an `X-Hub-Signature-256` header (`sha256=<hex>`) against the raw
/// request body.
pub fn verify_signature(body: &[u8], signature_header: &str, app_secret: &str) -> bool {
    let Some(provided) = signature_header.strip_prefix("sha256=") else {
        warn!("Signature header missing sha256= prefix.");
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(&expected, provided)
}

/// Constant-time comparison; never bails early on the first differing byte.
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// Wire types.

/// Top-level webhook delivery.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

/// One entry of a delivery; `id` is the receiving account.
#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

/// A messaging event as it appears on the wire.
#[derive(Debug, Default, Deserialize)]
pub struct MessagingEvent {
    #[serde(default)]
    pub sender: EventParty,
    #[serde(default)]
    pub recipient: EventParty,
    pub message: Option<MessageBody>,
    pub postback: Option<Postback>,
    pub read: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventParty {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub mid: String,
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub quick_reply: Option<QuickReply>,
}

#[derive(Debug, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type", default = "default_attachment_kind")]
    pub kind: String,
}

fn default_attachment_kind() -> String {
    "unknown".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct QuickReply {
    #[serde(default)]
    pub payload: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Postback {
    #[serde(default)]
    pub mid: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub title: String,
}

impl From<MessagingEvent> for InboundEvent {
    fn from(event: MessagingEvent) -> Self {
        let message = event.message.unwrap_or_default();
        let postback = event.postback.unwrap_or_default();

        let message_id = if !message.mid.is_empty() { message.mid.clone() } else { postback.mid.clone() };

        // Quick replies and postbacks resolve to their payloads; a postback
        // falls back to its title when the payload is empty.
        let text = message
            .quick_reply
            .as_ref()
            .and_then(|q| (!q.payload.is_empty()).then(|| q.payload.clone()))
            .or_else(|| message.text.clone())
            .or_else(|| (!postback.payload.is_empty()).then(|| postback.payload.clone()))
            .or_else(|| (!postback.title.is_empty()).then(|| postback.title.clone()))
            .filter(|t| !t.is_empty());

        let attachments = message.attachments.iter().map(|a| a.kind.clone()).collect();

        InboundEvent {
            sender_id: event.sender.id,
            recipient_id: event.recipient.id,
            message_id,
            text,
            attachments,
            is_echo: message.is_echo,
            is_read_receipt: event.read.is_some(),
        }
    }
}

// Tests.
