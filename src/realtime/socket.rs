use super::backoff::Backoff;
use super::protocol::{self, Incoming, PhoenixMessage, PHOENIX_TOPIC};
use crate::backend::{ChannelStatus, RealtimeCallback, RealtimeEvent, SubscriptionSpec};
use crate::config::RealtimeConfig;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, MessageEvent, WebSocket};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChannelHandle(u64);

struct Channel {
    spec: SubscriptionSpec,
    topic: String,
    access_token: Option<String>,
    join_ref: Option<String>,
    joined: bool,
    on_event: RealtimeCallback,
}

/// JS callbacks wired to one `WebSocket`; they must outlive the socket's use of them.
struct SocketHandlers {
    _on_open: Closure<dyn FnMut()>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
}

struct SocketState {
    endpoint: String,
    config: RealtimeConfig,
    ws: Option<WebSocket>,
    handlers: Option<SocketHandlers>,
    channels: BTreeMap<ChannelHandle, Channel>,
    next_handle: u64,
    next_ref: u64,
    backoff: Backoff,
    pending_heartbeat: Option<String>,
    heartbeat: Option<(i32, Closure<dyn FnMut()>)>,
    reconnect_timer: Option<i32>,
    /// Closures detached while one of them may still be on the stack;
    /// freed on the next connect.
    retired_handlers: Vec<SocketHandlers>,
    retired_heartbeats: Vec<Closure<dyn FnMut()>>,
}

impl SocketState {
    fn make_ref(&mut self) -> String {
        self.next_ref += 1;
        self.next_ref.to_string()
    }

    fn is_open(&self) -> bool {
        self.ws
            .as_ref()
            .is_some_and(|ws| ws.ready_state() == WebSocket::OPEN)
    }

    fn send(&self, msg: &PhoenixMessage) {
        let Some(ws) = self.ws.as_ref() else {
            return;
        };
        match serde_json::to_string(msg) {
            Ok(text) => {
                if let Err(e) = ws.send_with_str(&text) {
                    tracing::warn!(event = %msg.event, error = ?e, "realtime send failed");
                }
            }
            Err(e) => tracing::error!(error = %e, "realtime encode failed"),
        }
    }

    fn callbacks(&self) -> Vec<RealtimeCallback> {
        self.channels.values().map(|c| c.on_event.clone()).collect()
    }

    fn stop_heartbeat(&mut self) {
        if let Some((id, cb)) = self.heartbeat.take() {
            if let Some(win) = web_sys::window() {
                win.clear_interval_with_handle(id);
            }
            self.retired_heartbeats.push(cb);
        }
        self.pending_heartbeat = None;
    }

    /// Detach and close the current socket without triggering its close handler.
    fn detach_socket(&mut self) {
        if let Some(ws) = self.ws.take() {
            ws.set_onopen(None);
            ws.set_onmessage(None);
            ws.set_onclose(None);
            let _ = ws.close();
        }
        if let Some(h) = self.handlers.take() {
            self.retired_handlers.push(h);
        }
        for c in self.channels.values_mut() {
            c.joined = false;
            c.join_ref = None;
        }
    }
}

/// Single-socket Supabase Realtime client with automatic reconnect.
///
/// Channels survive socket drops: after a reconnect every channel is
/// re-joined and reports `Subscribed` again.
#[derive(Clone)]
pub struct RealtimeClient {
    state: Rc<RefCell<SocketState>>,
}

fn emit(callbacks: Vec<RealtimeCallback>, event: RealtimeEvent) {
    for cb in callbacks {
        cb(event.clone());
    }
}

impl RealtimeClient {
    pub fn new(endpoint: String, config: RealtimeConfig) -> Self {
        let backoff = Backoff::new(config.reconnect_base_ms, config.reconnect_max_ms);
        Self {
            state: Rc::new(RefCell::new(SocketState {
                endpoint,
                config,
                ws: None,
                handlers: None,
                channels: BTreeMap::new(),
                next_handle: 0,
                next_ref: 0,
                backoff,
                pending_heartbeat: None,
                heartbeat: None,
                reconnect_timer: None,
                retired_handlers: Vec::new(),
                retired_heartbeats: Vec::new(),
            })),
        }
    }

    fn from_weak(weak: &Weak<RefCell<SocketState>>) -> Option<Self> {
        weak.upgrade().map(|state| Self { state })
    }

    pub fn subscribe(
        &self,
        spec: SubscriptionSpec,
        access_token: Option<String>,
        on_event: RealtimeCallback,
    ) -> ChannelHandle {
        let (handle, needs_connect) = {
            let mut s = self.state.borrow_mut();
            s.next_handle += 1;
            let handle = ChannelHandle(s.next_handle);
            let topic = protocol::topic_for(&spec.channel);
            s.channels.insert(
                handle,
                Channel {
                    spec,
                    topic,
                    access_token,
                    join_ref: None,
                    joined: false,
                    on_event: on_event.clone(),
                },
            );

            if s.is_open() {
                self.join_locked(&mut s, handle);
            }
            (handle, s.ws.is_none() && s.reconnect_timer.is_none())
        };

        on_event(RealtimeEvent::Status(ChannelStatus::Connecting));
        if needs_connect {
            self.connect();
        }
        handle
    }

    pub fn unsubscribe(&self, handle: ChannelHandle) {
        let mut s = self.state.borrow_mut();
        let Some(channel) = s.channels.remove(&handle) else {
            return;
        };

        if channel.joined && s.is_open() {
            let msg_ref = s.make_ref();
            s.send(&protocol::leave(&channel.topic, msg_ref));
        }

        if s.channels.is_empty() {
            tracing::debug!("last realtime channel left, closing socket");
            s.stop_heartbeat();
            s.detach_socket();
            if let Some(id) = s.reconnect_timer.take() {
                if let Some(win) = web_sys::window() {
                    win.clear_timeout_with_handle(id);
                }
            }
            s.backoff.reset();
        }
    }

    fn join_locked(&self, s: &mut SocketState, handle: ChannelHandle) {
        let msg_ref = s.make_ref();
        let Some(channel) = s.channels.get_mut(&handle) else {
            return;
        };
        channel.join_ref = Some(msg_ref.clone());
        let msg = protocol::join(&channel.spec, channel.access_token.as_deref(), msg_ref);
        s.send(&msg);
    }

    fn connect(&self) {
        let endpoint = {
            let mut s = self.state.borrow_mut();
            s.reconnect_timer = None;
            s.retired_handlers.clear();
            s.retired_heartbeats.clear();
            if s.channels.is_empty() || s.ws.is_some() {
                return;
            }
            s.endpoint.clone()
        };

        let ws = match WebSocket::new(&endpoint) {
            Ok(ws) => ws,
            Err(e) => {
                tracing::warn!(error = ?e, "realtime socket could not be created");
                self.handle_drop("connect failed");
                return;
            }
        };

        let weak = Rc::downgrade(&self.state);

        let w = weak.clone();
        let on_open = Closure::<dyn FnMut()>::new(move || {
            if let Some(client) = Self::from_weak(&w) {
                client.on_open();
            }
        });

        let w = weak.clone();
        let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |ev: MessageEvent| {
            if let Some(client) = Self::from_weak(&w) {
                if let Some(text) = ev.data().as_string() {
                    client.on_message(&text);
                }
            }
        });

        let w = weak;
        let on_close = Closure::<dyn FnMut(CloseEvent)>::new(move |ev: CloseEvent| {
            if let Some(client) = Self::from_weak(&w) {
                tracing::warn!(code = ev.code(), reason = %ev.reason(), "realtime socket closed");
                client.handle_drop("socket closed");
            }
        });

        ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));
        ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        let mut s = self.state.borrow_mut();
        s.ws = Some(ws);
        s.handlers = Some(SocketHandlers {
            _on_open: on_open,
            _on_message: on_message,
            _on_close: on_close,
        });
        tracing::debug!("realtime socket connecting");
    }

    fn on_open(&self) {
        let mut s = self.state.borrow_mut();
        tracing::info!(channels = s.channels.len(), "realtime socket open");

        let handles: Vec<ChannelHandle> = s.channels.keys().copied().collect();
        for handle in handles {
            self.join_locked(&mut s, handle);
        }
        self.start_heartbeat(&mut s);
    }

    fn start_heartbeat(&self, s: &mut SocketState) {
        let Some(win) = web_sys::window() else {
            return;
        };

        let weak = Rc::downgrade(&self.state);
        let cb = Closure::<dyn FnMut()>::new(move || {
            if let Some(client) = Self::from_weak(&weak) {
                client.heartbeat_tick();
            }
        });

        match win.set_interval_with_callback_and_timeout_and_arguments_0(
            cb.as_ref().unchecked_ref(),
            s.config.heartbeat_ms,
        ) {
            Ok(id) => s.heartbeat = Some((id, cb)),
            Err(e) => tracing::warn!(error = ?e, "heartbeat timer could not start"),
        }
    }

    fn heartbeat_tick(&self) {
        let missed = {
            let mut s = self.state.borrow_mut();
            if !s.is_open() {
                return;
            }
            if s.pending_heartbeat.is_some() {
                true
            } else {
                let msg_ref = s.make_ref();
                s.send(&protocol::heartbeat(msg_ref.clone()));
                s.pending_heartbeat = Some(msg_ref);
                false
            }
        };

        if missed {
            tracing::warn!("realtime heartbeat timed out");
            self.handle_drop("heartbeat timeout");
        }
    }

    fn on_message(&self, text: &str) {
        let msg: PhoenixMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable realtime frame");
                return;
            }
        };

        match protocol::classify(&msg) {
            Incoming::Change { topic, change } => {
                let callbacks: Vec<RealtimeCallback> = self
                    .state
                    .borrow()
                    .channels
                    .values()
                    .filter(|c| c.joined && c.topic == topic)
                    .map(|c| c.on_event.clone())
                    .collect();
                emit(callbacks, RealtimeEvent::Change(change));
            }
            Incoming::Reply {
                topic,
                msg_ref,
                ok,
                reason,
            } => self.on_reply(&topic, msg_ref, ok, reason),
            Incoming::ChannelDown { topic, reason } => {
                // `phx_close` also acknowledges our own leave.
                let known = self.state.borrow().channels.values().any(|c| c.topic == topic);
                if !known {
                    return;
                }
                tracing::warn!(%topic, %reason, "realtime channel down");
                self.handle_drop("channel down");
            }
            Incoming::Ignored => {}
        }
    }

    fn on_reply(&self, topic: &str, msg_ref: Option<String>, ok: bool, reason: Option<String>) {
        if topic == PHOENIX_TOPIC {
            let mut s = self.state.borrow_mut();
            if s.pending_heartbeat.is_some() && s.pending_heartbeat == msg_ref {
                s.pending_heartbeat = None;
            }
            return;
        }

        let (callbacks, status) = {
            let mut s = self.state.borrow_mut();
            let mut callbacks = Vec::new();
            for c in s.channels.values_mut() {
                if c.topic != topic || c.join_ref.is_none() || c.join_ref != msg_ref {
                    continue;
                }
                c.joined = ok;
                callbacks.push(c.on_event.clone());
            }
            if callbacks.is_empty() {
                return;
            }

            if ok {
                s.backoff.reset();
                tracing::info!(%topic, "realtime channel joined");
                (callbacks, ChannelStatus::Subscribed)
            } else {
                tracing::error!(%topic, reason = ?reason, "realtime join rejected");
                (callbacks, ChannelStatus::Closed)
            }
        };

        emit(callbacks, RealtimeEvent::Status(status));
    }

    /// Socket lost: tear it down and schedule a reconnect with backoff.
    fn handle_drop(&self, cause: &str) {
        let (callbacks, attempt, delay_ms) = {
            let mut s = self.state.borrow_mut();
            s.stop_heartbeat();
            s.detach_socket();
            if s.channels.is_empty() || s.reconnect_timer.is_some() {
                return;
            }

            let delay_ms = s.backoff.next_delay();
            let attempt = s.backoff.attempt();

            let weak = Rc::downgrade(&self.state);
            let cb = Closure::once_into_js(move || {
                if let Some(client) = Self::from_weak(&weak) {
                    client.connect();
                }
            });
            let timer = web_sys::window().and_then(|win| {
                win.set_timeout_with_callback_and_timeout_and_arguments_0(
                    cb.unchecked_ref(),
                    i32::try_from(delay_ms).unwrap_or(i32::MAX),
                )
                .ok()
            });
            let Some(timer) = timer else {
                tracing::error!("no timer available, realtime stays offline");
                return;
            };
            s.reconnect_timer = Some(timer);

            (s.callbacks(), attempt, delay_ms)
        };

        tracing::warn!(cause, attempt, delay_ms, "realtime reconnect scheduled");
        emit(
            callbacks,
            RealtimeEvent::Status(ChannelStatus::Reconnecting { attempt, delay_ms }),
        );
    }
}
