//! Shared wire types: normalized service results, PostgREST response
//! handling, and realtime change-feed frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// serde default for timestamps absent from a payload.
pub fn epoch_ts() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// Uniform failure shape surfaced to the UI.
///
/// Both backend-reported errors and transport errors collapse into a single
/// user-facing message; the detailed cause is logged at the call site and
/// never surfaced. Failures are terminal for the triggering action: nothing
/// in this crate retries, times out, or backs off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub msg: String,
}

impl ServiceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl std::error::Error for ServiceError {}

/// Result shape shared by every data service.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Structured error body returned by the PostgREST query surface.
#[derive(Debug, Deserialize)]
pub struct PostgrestError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Common REST response handling: check the HTTP status, surface the
/// structured error body on failure, deserialize the payload on success.
/// Shared by all api modules.
pub async fn handle_rest_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    operation_name: &str,
) -> anyhow::Result<T> {
    use anyhow::Context;
    use tracing::{debug, error};

    let status = response.status();
    let body_bytes = response.bytes().await.context("failed to read body")?;
    let body_str = String::from_utf8_lossy(&body_bytes);
    debug!("[HTTP] {} response body: {}", operation_name, body_str);

    if !status.is_success() {
        // PostgREST reports errors as a JSON body; fall back to raw text
        if let Ok(err) = serde_json::from_slice::<PostgrestError>(&body_bytes) {
            error!(
                "[HTTP] {} failed, status: {}, code: {}, message: {}",
                operation_name, status, err.code, err.message
            );
            return Err(anyhow::anyhow!(
                "backend error {}: {}",
                err.code,
                err.message
            ));
        }
        error!(
            "[HTTP] {} failed, status: {}, body: {}",
            operation_name, status, body_str
        );
        return Err(anyhow::anyhow!("HTTP error {}: {}", status, body_str));
    }
    debug!("[HTTP] {} ok, status: {}", operation_name, status);

    serde_json::from_slice(&body_bytes).map_err(|e| {
        error!(
            "[HTTP] {} deserialization failed: {:?}, raw body: {}",
            operation_name, e, body_str
        );
        anyhow::anyhow!("failed to deserialize response: {:?}", e)
    })
}

/// One frame on the realtime socket (phoenix framing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub message_ref: Option<String>,
}

/// Lifecycle of one backend row as pushed over the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// A pushed insert/update/delete event with `new`/`old` row snapshots.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub schema: String,
    pub table: String,
    /// Row snapshot after the change (INSERT/UPDATE).
    pub new: Option<Value>,
    /// Row snapshot before the change (DELETE; primary key only on most
    /// tables).
    pub old: Option<Value>,
}

impl ChangeEvent {
    /// Parse the payload of a `postgres_changes`-style frame. The wire
    /// format carries `type`, `record` and `old_record`.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let kind = ChangeKind::parse(payload.get("type")?.as_str()?)?;
        let non_null = |v: Option<&Value>| match v {
            Some(Value::Null) | None => None,
            Some(other) => Some(other.clone()),
        };
        Some(Self {
            kind,
            schema: payload
                .get("schema")
                .and_then(|v| v.as_str())
                .unwrap_or("public")
                .to_string(),
            table: payload
                .get("table")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            new: non_null(payload.get("record")),
            old: non_null(payload.get("old_record")),
        })
    }

    /// Parse a change event out of a realtime frame. Newer servers carry
    /// the kind inside the payload (`type`); older ones name the frame's
    /// event after it.
    pub fn from_message(msg: &RealtimeMessage) -> Option<Self> {
        if let Some(event) = Self::from_payload(&msg.payload) {
            return Some(event);
        }
        let kind = ChangeKind::parse(&msg.event)?;
        // topic is `realtime:{schema}:{table}[:filter]`
        let mut parts = msg.topic.splitn(4, ':');
        let _ = parts.next();
        let schema = parts.next().unwrap_or("public").to_string();
        let table = parts.next().unwrap_or_default().to_string();
        let non_null = |v: Option<&Value>| match v {
            Some(Value::Null) | None => None,
            Some(other) => Some(other.clone()),
        };
        Some(Self {
            kind,
            schema,
            table,
            new: non_null(msg.payload.get("record")),
            old: non_null(msg.payload.get("old_record")),
        })
    }

    /// The snapshot a row filter applies to: `new` when present, else `old`.
    pub fn row(&self) -> Option<&Value> {
        self.new.as_ref().or(self.old.as_ref())
    }
}

/// Which event kinds a subscription wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    Insert,
    Update,
    Delete,
    All,
}

impl EventFilter {
    pub fn accepts(&self, kind: ChangeKind) -> bool {
        match self {
            Self::Insert => kind == ChangeKind::Insert,
            Self::Update => kind == ChangeKind::Update,
            Self::Delete => kind == ChangeKind::Delete,
            Self::All => true,
        }
    }
}

/// What one channel subscription is scoped to: event kind, schema, table and
/// an optional `column=eq.value` row filter.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub event: EventFilter,
    pub schema: String,
    pub table: String,
    pub filter: Option<String>,
}

impl ChannelSpec {
    pub fn table(event: EventFilter, table: impl Into<String>) -> Self {
        Self {
            event,
            schema: "public".to_string(),
            table: table.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Channel topic, e.g. `realtime:public:posts` or
    /// `realtime:public:notifications:receiver_id=eq.42`.
    pub fn topic(&self) -> String {
        match &self.filter {
            Some(f) => format!("realtime:{}:{}:{}", self.schema, self.table, f),
            None => format!("realtime:{}:{}", self.schema, self.table),
        }
    }

    /// Whether a pushed event belongs to this subscription. The row filter
    /// is re-checked client-side even though the topic already scopes it.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if !self.event.accepts(event.kind) {
            return false;
        }
        if self.schema != event.schema || self.table != event.table {
            return false;
        }
        match &self.filter {
            None => true,
            Some(f) => match event.row() {
                Some(row) => row_matches_filter(row, f),
                None => false,
            },
        }
    }
}

/// Evaluate a `column=eq.value` filter against a row snapshot. Only the
/// equality operator exists on the change feed.
pub fn row_matches_filter(row: &Value, filter: &str) -> bool {
    let Some((column, rest)) = filter.split_once('=') else {
        return false;
    };
    let Some(expected) = rest.strip_prefix("eq.") else {
        return false;
    };
    match row.get(column) {
        Some(Value::String(s)) => s == expected,
        Some(Value::Number(n)) => n.to_string() == expected,
        Some(Value::Bool(b)) => b.to_string() == expected,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn insert_payload() -> Value {
        json!({
            "type": "INSERT",
            "schema": "public",
            "table": "notifications",
            "record": {"id": 7, "receiver_id": "u-1", "title": "Commented on your post"},
            "old_record": null
        })
    }

    #[test]
    fn parses_insert_event() {
        let event = ChangeEvent::from_payload(&insert_payload()).unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.table, "notifications");
        assert!(event.new.is_some());
        assert!(event.old.is_none());
    }

    #[test]
    fn unknown_event_type_is_dropped() {
        let payload = json!({"type": "TRUNCATE", "table": "posts"});
        assert!(ChangeEvent::from_payload(&payload).is_none());
    }

    #[test]
    fn row_filter_matches_string_and_number_columns() {
        let row = json!({"receiver_id": "u-1", "post_id": 42});
        assert!(row_matches_filter(&row, "receiver_id=eq.u-1"));
        assert!(row_matches_filter(&row, "post_id=eq.42"));
        assert!(!row_matches_filter(&row, "receiver_id=eq.u-2"));
        assert!(!row_matches_filter(&row, "missing=eq.u-1"));
        // only `eq.` is understood
        assert!(!row_matches_filter(&row, "post_id=gt.1"));
    }

    #[test]
    fn spec_scopes_by_event_kind_table_and_filter() {
        let event = ChangeEvent::from_payload(&insert_payload()).unwrap();

        let spec = ChannelSpec::table(EventFilter::Insert, "notifications")
            .with_filter("receiver_id=eq.u-1");
        assert!(spec.matches(&event));
        assert_eq!(
            spec.topic(),
            "realtime:public:notifications:receiver_id=eq.u-1"
        );

        let other_user = ChannelSpec::table(EventFilter::Insert, "notifications")
            .with_filter("receiver_id=eq.u-2");
        assert!(!other_user.matches(&event));

        let deletes_only = ChannelSpec::table(EventFilter::Delete, "notifications");
        assert!(!deletes_only.matches(&event));

        let wildcard = ChannelSpec::table(EventFilter::All, "notifications");
        assert!(wildcard.matches(&event));
    }

    #[test]
    fn delete_events_filter_on_old_snapshot() {
        let payload = json!({
            "type": "DELETE",
            "schema": "public",
            "table": "posts",
            "old_record": {"id": 3}
        });
        let event = ChangeEvent::from_payload(&payload).unwrap();
        let spec = ChannelSpec::table(EventFilter::All, "posts").with_filter("id=eq.3");
        assert!(spec.matches(&event));
    }
}
