//! Supabase Realtime over Phoenix channels (JSON serializer, v1.0.0).

use crate::backend::{ChangeEvent, ChangeKind, SubscriptionSpec};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub(crate) const PHOENIX_TOPIC: &str = "phoenix";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Incoming {
    Change {
        topic: String,
        change: ChangeEvent,
    },
    Reply {
        topic: String,
        msg_ref: Option<String>,
        ok: bool,
        reason: Option<String>,
    },
    /// The server closed or errored the channel.
    ChannelDown { topic: String, reason: String },
    Ignored,
}

pub(crate) fn topic_for(channel: &str) -> String {
    format!("realtime:{channel}")
}

/// `https://x.supabase.co` -> `wss://x.supabase.co/realtime/v1/websocket?apikey=..&vsn=1.0.0`
pub(crate) fn websocket_url(supabase_url: &str, anon_key: &str) -> String {
    let base = supabase_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!(
        "{base}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
        urlencoding::encode(anon_key)
    )
}

pub(crate) fn join(spec: &SubscriptionSpec, access_token: Option<&str>, msg_ref: String) -> PhoenixMessage {
    let mut change = json!({
        "event": "*",
        "schema": spec.schema,
        "table": spec.table,
    });
    if let Some(filter) = &spec.filter {
        change["filter"] = json!(filter);
    }

    let mut payload = json!({
        "config": {
            "broadcast": { "ack": false, "self": false },
            "presence": { "key": "" },
            "postgres_changes": [change],
            "private": false,
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = json!(token);
    }

    PhoenixMessage {
        topic: topic_for(&spec.channel),
        event: "phx_join".to_string(),
        payload,
        msg_ref: Some(msg_ref),
    }
}

pub(crate) fn leave(topic: &str, msg_ref: String) -> PhoenixMessage {
    PhoenixMessage {
        topic: topic.to_string(),
        event: "phx_leave".to_string(),
        payload: json!({}),
        msg_ref: Some(msg_ref),
    }
}

pub(crate) fn heartbeat(msg_ref: String) -> PhoenixMessage {
    PhoenixMessage {
        topic: PHOENIX_TOPIC.to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        msg_ref: Some(msg_ref),
    }
}

fn parse_change(payload: &serde_json::Value) -> Option<ChangeEvent> {
    let data = payload.get("data")?;
    let kind: ChangeKind = data.get("type")?.as_str()?.parse().ok()?;
    let table = data
        .get("table")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let id_of = |key: &str| {
        data.get(key)
            .and_then(|r| r.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    let record_id = id_of("record").or_else(|| id_of("old_record"));

    Some(ChangeEvent {
        kind,
        table,
        record_id,
    })
}

pub(crate) fn classify(msg: &PhoenixMessage) -> Incoming {
    let status = msg.payload.get("status").and_then(|v| v.as_str());

    match msg.event.as_str() {
        "postgres_changes" => match parse_change(&msg.payload) {
            Some(change) => Incoming::Change {
                topic: msg.topic.clone(),
                change,
            },
            None => Incoming::Ignored,
        },
        "phx_reply" => Incoming::Reply {
            topic: msg.topic.clone(),
            msg_ref: msg.msg_ref.clone(),
            ok: status == Some("ok"),
            reason: msg
                .payload
                .get("response")
                .and_then(|r| r.get("reason"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
        },
        "phx_close" => Incoming::ChannelDown {
            topic: msg.topic.clone(),
            reason: "closed by server".to_string(),
        },
        "phx_error" => Incoming::ChannelDown {
            topic: msg.topic.clone(),
            reason: "channel error".to_string(),
        },
        // Supabase reports postgres_changes setup failures as a system event.
        "system" if status == Some("error") => Incoming::ChannelDown {
            topic: msg.topic.clone(),
            reason: msg
                .payload
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("system error")
                .to_string(),
        },
        _ => Incoming::Ignored,
    }
}
