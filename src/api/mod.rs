//! Supabase client: GoTrue auth, PostgREST tables, Realtime channels.

use crate::backend::{
    AuthProvider, OAuthProvider, Query, RealtimeCallback, RealtimeProvider, SubscriptionSpec,
    TableClient,
};
use crate::config::EnvConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{ProviderUser, Session};
use crate::realtime::{protocol, ChannelHandle, RealtimeClient};
use crate::storage::{clear_session, load_session, save_session};
use crate::util::now_secs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Path the provider sends the browser back to after sign-in.
pub(crate) const AUTH_CALLBACK_PATH: &str = "/bookmarks";

/// Token set carried in the URL fragment by the implicit OAuth flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FragmentAuth {
    Tokens {
        access_token: String,
        refresh_token: Option<String>,
        token_type: String,
        expires_at: Option<i64>,
    },
    Error(String),
}

/// Parse `#access_token=..&refresh_token=..&expires_in=3600&...`.
///
/// Returns `None` for fragments that carry neither tokens nor an auth error.
pub(crate) fn parse_fragment(hash: &str, now_secs: i64) -> Option<FragmentAuth> {
    let hash = hash.strip_prefix('#').unwrap_or(hash);
    let get = |key: &str| {
        hash.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            if k != key {
                return None;
            }
            let v = v.replace('+', " ");
            urlencoding::decode(&v).ok().map(|s| s.into_owned())
        })
    };

    if let Some(access_token) = get("access_token").filter(|t| !t.is_empty()) {
        let expires_at = get("expires_at")
            .and_then(|v| v.parse::<i64>().ok())
            .or_else(|| {
                get("expires_in")
                    .and_then(|v| v.parse::<i64>().ok())
                    .map(|secs| now_secs + secs)
            });
        return Some(FragmentAuth::Tokens {
            access_token,
            refresh_token: get("refresh_token").filter(|t| !t.is_empty()),
            token_type: get("token_type").unwrap_or_else(|| "bearer".to_string()),
            expires_at,
        });
    }

    let error = get("error_description").or_else(|| get("error"))?;
    Some(FragmentAuth::Error(error))
}

/// `POST /auth/v1/token` response.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: ProviderUser,
}

impl TokenResponse {
    pub(crate) fn into_session(self, now_secs: i64) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at: self
                .expires_at
                .or_else(|| self.expires_in.map(|secs| now_secs + secs)),
            user: self.user,
        }
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

struct ClientInner {
    config: EnvConfig,
    http: reqwest::Client,
    session: RefCell<Option<Session>>,
    realtime: RealtimeClient,
}

/// Shared handle to the hosted service. Cloning is cheap.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Rc<ClientInner>,
}

impl SupabaseClient {
    pub fn new(config: EnvConfig) -> Self {
        let endpoint = protocol::websocket_url(&config.supabase_url, &config.supabase_anon_key);
        let realtime = RealtimeClient::new(endpoint, config.realtime.clone());
        Self {
            inner: Rc::new(ClientInner {
                config,
                http: reqwest::Client::new(),
                session: RefCell::new(None),
                realtime,
            }),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.config.supabase_url, path)
    }

    fn access_token(&self) -> Option<String> {
        self.inner
            .session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    fn with_auth_headers(
        &self,
        req: reqwest::RequestBuilder,
        token: Option<String>,
    ) -> reqwest::RequestBuilder {
        let key = &self.inner.config.supabase_anon_key;
        let bearer = token.unwrap_or_else(|| key.clone());
        req.header("apikey", key)
            .header("Authorization", format!("Bearer {bearer}"))
    }

    async fn send(&self, req: reqwest::RequestBuilder, ctx: &str) -> ApiResult<reqwest::Response> {
        let res = req.send().await.map_err(ApiError::network)?;

        if res.status().is_success() {
            Ok(res)
        } else if res.status().as_u16() == 401 {
            Err(ApiError::unauthorized())
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::http(status, body, ctx))
        }
    }

    fn remember(&self, session: Option<Session>) {
        match &session {
            Some(s) => save_session(s),
            None => clear_session(),
        }
        *self.inner.session.borrow_mut() = session;
    }

    async fn fetch_user(&self, access_token: &str) -> ApiResult<ProviderUser> {
        let req = self.with_auth_headers(
            self.inner.http.get(self.url("/auth/v1/user")),
            Some(access_token.to_string()),
        );
        self.send(req, "Fetch user failed")
            .await?
            .json()
            .await
            .map_err(ApiError::parse)
    }

    async fn refresh(&self, refresh_token: &str) -> ApiResult<Session> {
        let req = self
            .with_auth_headers(
                self.inner
                    .http
                    .post(self.url("/auth/v1/token?grant_type=refresh_token")),
                None,
            )
            .json(&RefreshRequest { refresh_token });
        let tokens: TokenResponse = self
            .send(req, "Token refresh failed")
            .await?
            .json()
            .await
            .map_err(ApiError::parse)?;
        Ok(tokens.into_session(now_secs()))
    }

    /// Consume an OAuth callback fragment, if the current URL carries one.
    async fn session_from_fragment(&self) -> ApiResult<Option<Session>> {
        let Some(window) = web_sys::window() else {
            return Ok(None);
        };
        let location = window.location();
        let hash = location.hash().unwrap_or_default();
        let Some(parsed) = parse_fragment(&hash, now_secs()) else {
            return Ok(None);
        };

        // Strip the tokens from the address bar before anything else runs.
        let clean = format!(
            "{}{}",
            location.pathname().unwrap_or_default(),
            location.search().unwrap_or_default()
        );
        if let Ok(history) = window.history() {
            let _ = history.replace_state_with_url(&wasm_bindgen::JsValue::NULL, "", Some(&clean));
        }

        match parsed {
            FragmentAuth::Error(e) => {
                tracing::warn!(error = %e, "provider returned an auth error");
                Ok(None)
            }
            FragmentAuth::Tokens {
                access_token,
                refresh_token,
                token_type,
                expires_at,
            } => {
                let user = self.fetch_user(&access_token).await?;
                tracing::info!(user_id = %user.id, "session established from provider callback");
                Ok(Some(Session {
                    access_token,
                    refresh_token,
                    token_type,
                    expires_at,
                    user,
                }))
            }
        }
    }
}

impl AuthProvider for SupabaseClient {
    async fn get_session(&self) -> ApiResult<Option<Session>> {
        if let Some(session) = self.session_from_fragment().await? {
            self.remember(Some(session.clone()));
            return Ok(Some(session));
        }

        let cached = self.inner.session.borrow().clone();
        let Some(session) = cached.or_else(load_session) else {
            return Ok(None);
        };

        if !session.is_expired(now_secs()) {
            *self.inner.session.borrow_mut() = Some(session.clone());
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            tracing::debug!("stored session expired without refresh token");
            self.remember(None);
            return Ok(None);
        };

        match self.refresh(&refresh_token).await {
            Ok(fresh) => {
                tracing::info!("session refreshed");
                self.remember(Some(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(e) => {
                tracing::warn!(error = %e, "session refresh failed");
                self.remember(None);
                Ok(None)
            }
        }
    }

    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> ApiResult<()> {
        let window = web_sys::window().ok_or_else(|| ApiError::network("no window"))?;
        let origin = window
            .location()
            .origin()
            .map_err(|e| ApiError::network(format!("{e:?}")))?;
        let redirect_to = format!("{origin}{AUTH_CALLBACK_PATH}");
        let url = self.url(&format!(
            "/auth/v1/authorize?provider={provider}&redirect_to={}",
            urlencoding::encode(&redirect_to)
        ));

        tracing::info!(%provider, "redirecting to identity provider");
        window
            .location()
            .set_href(&url)
            .map_err(|e| ApiError::network(format!("{e:?}")))
    }

    async fn sign_out(&self) -> ApiResult<()> {
        let token = self.access_token();
        self.remember(None);

        let Some(token) = token else {
            return Ok(());
        };
        let req = self.with_auth_headers(self.inner.http.post(self.url("/auth/v1/logout")), Some(token));
        self.send(req, "Logout failed").await.map(|_| ())
    }
}

impl TableClient for SupabaseClient {
    async fn select<T: DeserializeOwned>(&self, query: &Query) -> ApiResult<Vec<T>> {
        let mut url = self.url(&format!("/rest/v1/{}?select=*", query.table));
        let qs = query.to_query_string();
        if !qs.is_empty() {
            url.push('&');
            url.push_str(&qs);
        }

        let req = self.with_auth_headers(self.inner.http.get(url), self.access_token());
        self.send(req, "Select failed")
            .await?
            .json()
            .await
            .map_err(ApiError::parse)
    }

    async fn insert<T: Serialize>(&self, table: &str, row: &T) -> ApiResult<()> {
        let req = self
            .with_auth_headers(
                self.inner.http.post(self.url(&format!("/rest/v1/{table}"))),
                self.access_token(),
            )
            .header("Prefer", "return=minimal")
            .json(row);
        self.send(req, "Insert failed").await.map(|_| ())
    }

    async fn delete(&self, query: &Query) -> ApiResult<()> {
        let url = self.url(&format!("/rest/v1/{}?{}", query.table, query.to_query_string()));
        let req = self.with_auth_headers(self.inner.http.delete(url), self.access_token());
        self.send(req, "Delete failed").await.map(|_| ())
    }
}

impl RealtimeProvider for SupabaseClient {
    type Handle = ChannelHandle;

    fn subscribe(
        &self,
        spec: SubscriptionSpec,
        on_event: RealtimeCallback,
    ) -> ApiResult<Self::Handle> {
        Ok(self
            .inner
            .realtime
            .subscribe(spec, self.access_token(), on_event))
    }

    fn unsubscribe(&self, handle: Self::Handle) {
        self.inner.realtime.unsubscribe(handle);
    }
}
