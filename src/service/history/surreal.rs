//! Conversation storage backed by SurrealDB.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::{Surreal, engine::any::Any, opt::auth::Root};
use tracing::instrument;

use crate::base::{
    config::Config,
    types::{ConversationTurn, Res, Role, Void},
};

use super::{GenericHistoryStore, HistoryClient};

// Extra methods on `HistoryClient` applied by the surreal implementation.

impl HistoryClient {
    /// Connect to the endpoint from the config (`memory` for an in-process
    /// store, `ws://`/`http://` for a server).
    pub async fn surreal(config: &Config) -> Res<Self> {
        let client = SurrealHistoryStore::new(&config.db_endpoint, &config.db_username, &config.db_password).await?;
        Ok(Self { inner: Arc::new(client) })
    }

    /// In-process store; used by tests.
    pub async fn surreal_memory() -> Res<Self> {
        let client = SurrealHistoryStore::new("memory", "", "").await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Structs.

/// Row shape for a stored conversation turn.
///
/// `seq` duplicates the timestamp as epoch microseconds; ordering on the
/// integer avoids the varying fractional precision of serialized datetimes.
#[derive(Debug, Serialize, Deserialize)]
struct TurnRecord {
    user_id: String,
    role: Role,
    content: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    seq: i64,
}

/// SurrealDB-backed history store.
#[derive(Clone)]
pub struct SurrealHistoryStore {
    db: Surreal<Any>,
}

impl SurrealHistoryStore {
    /// Connect and select the bot's namespace and database.
    #[instrument(name = "SurrealHistoryStore::new", skip_all)]
    pub async fn new(endpoint: &str, username: &str, password: &str) -> Res<Self> {
        let db = surrealdb::engine::any::connect(endpoint).await?;

        // The in-process engines have no authentication.
        if !username.is_empty() {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns("reply_bot").use_db("conversations").await?;

        Ok(Self { db })
    }
}

#[async_trait]
impl GenericHistoryStore for SurrealHistoryStore {
    #[instrument(skip(self, content))]
    async fn append(&self, user_id: &str, role: Role, content: &str) -> Void {
        let now = chrono::Utc::now();
        let record = TurnRecord {
            user_id: user_id.to_string(),
            role,
            content: content.to_string(),
            timestamp: now,
            seq: now.timestamp_micros(),
        };

        let _: Option<TurnRecord> = self.db.create("turn").content(record).await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn recent(&self, user_id: &str, limit: usize) -> Res<Vec<ConversationTurn>> {
        let mut response = self
            .db
            .query(format!("SELECT role, content, timestamp, seq FROM turn WHERE user_id = $user_id ORDER BY seq DESC LIMIT {limit}"))
            .bind(("user_id", user_id.to_string()))
            .await?;

        let mut turns: Vec<ConversationTurn> = response.take(0)?;

        // The query is newest-first so the limit keeps the tail; callers get
        // oldest-first.
        turns.reverse();

        Ok(turns)
    }

    #[instrument(skip(self))]
    async fn reset(&self, user_id: &str) -> Void {
        self.db.query("DELETE turn WHERE user_id = $user_id").bind(("user_id", user_id.to_string())).await?;

        Ok(())
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_and_recent_oldest_first() {
        let history = HistoryClient::surreal_memory().await.unwrap();

        history.append("u1", Role::User, "first").await.unwrap();
        history.append("u1", Role::Assistant, "second").await.unwrap();
        history.append("u1", Role::User, "third").await.unwrap();

        let turns = history.recent("u1", 10).await.unwrap();

        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].content, "first");
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].content, "second");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[2].content, "third");
    }

    #[tokio::test]
    async fn recent_limit_keeps_newest() {
        let history = HistoryClient::surreal_memory().await.unwrap();

        for i in 1..=5 {
            history.append("u1", Role::User, &format!("msg{i}")).await.unwrap();
        }

        let turns = history.recent("u1", 2).await.unwrap();

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "msg4");
        assert_eq!(turns[1].content, "msg5");
    }

    #[tokio::test]
    async fn reset_only_clears_one_user() {
        let history = HistoryClient::surreal_memory().await.unwrap();

        history.append("u1", Role::User, "hello").await.unwrap();
        history.append("u2", Role::User, "hola").await.unwrap();

        history.reset("u1").await.unwrap();

        assert!(history.recent("u1", 10).await.unwrap().is_empty());
        assert_eq!(history.recent("u2", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn recent_for_unknown_user_is_empty() {
        let history = HistoryClient::surreal_memory().await.unwrap();

        assert!(history.recent("nobody", 10).await.unwrap().is_empty());
    }
}
