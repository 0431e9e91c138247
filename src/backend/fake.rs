use super::{
    AuthProvider, Navigator, OAuthProvider, Query, RealtimeCallback, RealtimeEvent,
    RealtimeProvider, SubscriptionSpec, TableClient,
};
use crate::error::{ApiError, ApiResult};
use crate::models::{ProviderUser, Session};
use futures::channel::oneshot;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

/// In-memory stand-in for the hosted service.
///
/// Individual calls can be failed (`fail_*`) or held until released
/// (`hold_*`); every call is recorded in `calls`.
#[derive(Default)]
pub(crate) struct FakeState {
    pub session: Option<Session>,
    pub session_error: bool,
    pub rows: Vec<serde_json::Value>,
    pub next_row: u64,
    /// Ignore query filters on select (a misbehaving server).
    pub leaky_select: bool,
    pub fail_select: u32,
    pub fail_insert: u32,
    pub fail_delete: u32,
    pub fail_subscribe: bool,
    pub select_gates: VecDeque<oneshot::Receiver<()>>,
    pub delete_gates: VecDeque<oneshot::Receiver<()>>,
    pub subscriptions: BTreeMap<u64, (SubscriptionSpec, RealtimeCallback)>,
    pub next_handle: u64,
    pub calls: Vec<String>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeBackend {
    pub state: Rc<RefCell<FakeState>>,
}

pub(crate) fn user(id: &str, email: &str) -> ProviderUser {
    ProviderUser {
        id: id.to_string(),
        email: Some(email.to_string()),
        user_metadata: serde_json::json!({}),
    }
}

pub(crate) fn session_for(user: ProviderUser) -> Session {
    Session {
        access_token: format!("token-{}", user.id),
        refresh_token: None,
        token_type: "bearer".to_string(),
        expires_at: None,
        user,
    }
}

fn matches(query: &Query, row: &serde_json::Value) -> bool {
    query
        .filters
        .iter()
        .all(|(col, val)| row.get(col).and_then(|v| v.as_str()) == Some(val.as_str()))
}

impl FakeBackend {
    pub fn signed_in(user: ProviderUser) -> Self {
        let fake = Self::default();
        fake.state.borrow_mut().session = Some(session_for(user));
        fake
    }

    /// Seed a row directly, bypassing validation. Later seeds are newer.
    pub fn seed(&self, id: &str, owner: &str, title: &str) {
        let mut s = self.state.borrow_mut();
        s.next_row += 1;
        let created_at = format!("2024-01-01T00:00:{:02}Z", s.next_row);
        s.rows.push(serde_json::json!({
            "id": id,
            "title": title,
            "url": format!("https://{id}.example.com"),
            "user_id": owner,
            "created_at": created_at,
        }));
    }

    pub fn row_ids(&self) -> Vec<String> {
        self.state
            .borrow()
            .rows
            .iter()
            .filter_map(|r| r.get("id").and_then(|v| v.as_str()).map(str::to_string))
            .collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn store_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                c.starts_with("select") || c.starts_with("insert") || c.starts_with("delete")
            })
            .count()
    }

    pub fn hold_next_select(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.borrow_mut().select_gates.push_back(rx);
        tx
    }

    pub fn hold_next_delete(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.borrow_mut().delete_gates.push_back(rx);
        tx
    }

    pub fn active_subscriptions(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }

    /// Deliver an event to every open subscription.
    pub fn emit(&self, event: RealtimeEvent) {
        let callbacks: Vec<RealtimeCallback> = self
            .state
            .borrow()
            .subscriptions
            .values()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in callbacks {
            cb(event.clone());
        }
    }
}

impl AuthProvider for FakeBackend {
    async fn get_session(&self) -> ApiResult<Option<Session>> {
        let s = self.state.borrow();
        if s.session_error {
            return Err(ApiError::network("auth service unreachable"));
        }
        Ok(s.session.clone())
    }

    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> ApiResult<()> {
        self.state
            .borrow_mut()
            .calls
            .push(format!("sign_in {provider}"));
        Ok(())
    }

    async fn sign_out(&self) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        s.session = None;
        s.calls.push("sign_out".to_string());
        Ok(())
    }
}

impl TableClient for FakeBackend {
    /// The response is computed when the call is issued; a held select
    /// delivers that (possibly outdated) snapshot when released.
    async fn select<T: DeserializeOwned>(&self, query: &Query) -> ApiResult<Vec<T>> {
        let (response, gate) = {
            let mut s = self.state.borrow_mut();
            s.calls
                .push(format!("select {} {}", query.table, query.to_query_string()));
            let gate = s.select_gates.pop_front();

            let response = if s.fail_select > 0 {
                s.fail_select -= 1;
                Err(ApiError::network("select failed"))
            } else {
                let mut rows: Vec<serde_json::Value> = s
                    .rows
                    .iter()
                    .filter(|r| s.leaky_select || matches(query, r))
                    .cloned()
                    .collect();

                if let Some((col, ascending)) = &query.order {
                    rows.sort_by(|a, b| {
                        let a = a.get(col).and_then(|v| v.as_str()).unwrap_or_default();
                        let b = b.get(col).and_then(|v| v.as_str()).unwrap_or_default();
                        if *ascending {
                            a.cmp(b)
                        } else {
                            b.cmp(a)
                        }
                    });
                }
                Ok(rows)
            };
            (response, gate)
        };

        if let Some(gate) = gate {
            let _ = gate.await;
        }

        response?
            .into_iter()
            .map(|r| serde_json::from_value(r).map_err(ApiError::parse))
            .collect()
    }

    async fn insert<T: Serialize>(&self, table: &str, row: &T) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        s.calls.push(format!("insert {table}"));
        if s.fail_insert > 0 {
            s.fail_insert -= 1;
            return Err(ApiError::network("insert failed"));
        }

        let mut value = serde_json::to_value(row).map_err(ApiError::parse)?;
        s.next_row += 1;
        let n = s.next_row;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("id".to_string(), serde_json::json!(format!("row-{n}")));
            obj.insert(
                "created_at".to_string(),
                serde_json::json!(format!("2024-01-01T00:00:{n:02}Z")),
            );
        }
        s.rows.push(value);
        Ok(())
    }

    async fn delete(&self, query: &Query) -> ApiResult<()> {
        let gate = {
            let mut s = self.state.borrow_mut();
            s.calls
                .push(format!("delete {} {}", query.table, query.to_query_string()));
            s.delete_gates.pop_front()
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let mut s = self.state.borrow_mut();
        if s.fail_delete > 0 {
            s.fail_delete -= 1;
            return Err(ApiError::http(500, "boom".to_string(), "Delete failed"));
        }
        s.rows.retain(|r| !matches(query, r));
        Ok(())
    }
}

impl RealtimeProvider for FakeBackend {
    type Handle = u64;

    fn subscribe(&self, spec: SubscriptionSpec, on_event: RealtimeCallback) -> ApiResult<u64> {
        let mut s = self.state.borrow_mut();
        s.calls.push(format!(
            "subscribe {} {}",
            spec.table,
            spec.filter.clone().unwrap_or_default()
        ));
        if s.fail_subscribe {
            return Err(ApiError::network("socket refused"));
        }
        s.next_handle += 1;
        let handle = s.next_handle;
        s.subscriptions.insert(handle, (spec, on_event));
        Ok(handle)
    }

    fn unsubscribe(&self, handle: u64) {
        let mut s = self.state.borrow_mut();
        s.calls.push(format!("unsubscribe {handle}"));
        s.subscriptions.remove(&handle);
    }
}

#[derive(Default)]
pub(crate) struct RecordingNavigator {
    pub redirects: RefCell<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        self.redirects.borrow_mut().push(path.to_string());
    }
}
