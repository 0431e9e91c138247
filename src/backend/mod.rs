//! Contract with the hosted auth + data service.
//!
//! The data flow in [`crate::sync`] only talks to these traits. The browser
//! build plugs in [`crate::api::SupabaseClient`]; tests plug in
//! [`fake::FakeBackend`].

#[cfg(test)]
pub(crate) mod fake;

use crate::error::ApiResult;
use crate::models::Session;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
}

#[allow(async_fn_in_trait)]
pub trait AuthProvider {
    /// Current session, or `None` when nobody is signed in.
    async fn get_session(&self) -> ApiResult<Option<Session>>;

    /// Starts the provider redirect. On success the page navigates away.
    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> ApiResult<()>;

    async fn sign_out(&self) -> ApiResult<()>;
}

/// Owner-scoped row query: `table(name).eq(col, val).order(col, asc)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub table: String,
    pub filters: Vec<(String, String)>,
    pub order: Option<(String, bool)>,
}

impl Query {
    pub fn table(name: &str) -> Self {
        Self {
            table: name.to_string(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.filters.push((column.to_string(), value.to_string()));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some((column.to_string(), ascending));
        self
    }

    /// PostgREST query string, e.g. `user_id=eq.abc&order=created_at.desc`.
    pub fn to_query_string(&self) -> String {
        let mut parts: Vec<String> = self
            .filters
            .iter()
            .map(|(col, val)| format!("{}=eq.{}", col, urlencoding::encode(val)))
            .collect();

        if let Some((col, ascending)) = &self.order {
            let dir = if *ascending { "asc" } else { "desc" };
            parts.push(format!("order={col}.{dir}"));
        }

        parts.join("&")
    }
}

#[allow(async_fn_in_trait)]
pub trait TableClient {
    async fn select<T: DeserializeOwned>(&self, query: &Query) -> ApiResult<Vec<T>>;

    async fn insert<T: Serialize>(&self, table: &str, row: &T) -> ApiResult<()>;

    async fn delete(&self, query: &Query) -> ApiResult<()>;
}

/// What a realtime channel listens to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionSpec {
    pub channel: String,
    pub schema: String,
    pub table: String,
    /// Server-side row filter, e.g. `user_id=eq.<id>`.
    pub filter: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: String,
    pub record_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelStatus {
    Connecting,
    Subscribed,
    Reconnecting { attempt: u32, delay_ms: u32 },
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RealtimeEvent {
    Change(ChangeEvent),
    Status(ChannelStatus),
}

pub type RealtimeCallback = Rc<dyn Fn(RealtimeEvent)>;

pub trait RealtimeProvider {
    type Handle;

    fn subscribe(&self, spec: SubscriptionSpec, on_event: RealtimeCallback)
        -> ApiResult<Self::Handle>;

    fn unsubscribe(&self, handle: Self::Handle);
}

/// Everything the bookmark view needs from the hosted service.
pub trait Collaborator: AuthProvider + TableClient + RealtimeProvider {}

impl<T: AuthProvider + TableClient + RealtimeProvider> Collaborator for T {}

pub trait Navigator {
    fn redirect(&self, path: &str);
}
