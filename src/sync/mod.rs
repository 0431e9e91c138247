//! Session-gated live sync for the bookmarks view.
//!
//! Lifecycle: [`BookmarkSync::activate`] validates the session, derives the
//! identity, runs the initial fetch and then opens one owner-filtered realtime
//! subscription. Every change notification triggers a sequenced full refetch.
//! [`BookmarkSync::teardown`] (or dropping the last handle) releases the
//! subscription; results that arrive afterwards are discarded.

mod list_state;

pub use list_state::ListState;

use crate::backend::{
    ChannelStatus, Collaborator, Navigator, RealtimeEvent, RealtimeProvider, SubscriptionSpec,
};
use crate::error::{SyncError, SyncResult};
use crate::identity;
use crate::models::{Bookmark, Identity};
use crate::session::{require_session, LOGIN_PATH};
use crate::store::{BookmarkStore, CreateOutcome, BOOKMARKS_TABLE, OWNER_COLUMN};
use futures::task::{LocalSpawn, LocalSpawnExt};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

const CHANNEL_NAME: &str = "bookmarks-realtime";
const SCHEMA: &str = "public";

/// Receives view-facing state changes.
pub trait SyncObserver {
    fn list_changed(&self, items: &[Bookmark]);

    fn connection_changed(&self, _status: ChannelStatus) {}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Activation {
    Ready(Identity),
    /// The view was torn down before activation finished.
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Activating,
    Active,
    TornDown,
}

/// Owns one subscription handle; releasing happens exactly once, on drop.
struct Subscription<C: RealtimeProvider> {
    client: Rc<C>,
    handle: Option<C::Handle>,
}

impl<C: RealtimeProvider> Drop for Subscription<C> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.client.unsubscribe(handle);
            tracing::info!("realtime subscription released");
        }
    }
}

struct Inner<C: Collaborator> {
    client: Rc<C>,
    store: BookmarkStore<C>,
    navigator: Rc<dyn Navigator>,
    spawner: Rc<dyn LocalSpawn>,
    observer: Rc<dyn SyncObserver>,
    phase: Cell<Phase>,
    identity: RefCell<Option<Identity>>,
    list: RefCell<ListState>,
    live: Cell<bool>,
    /// Set when the channel dropped; the next join triggers a catch-up fetch.
    missed_changes: Cell<bool>,
    subscription: RefCell<Option<Subscription<C>>>,
}

pub struct BookmarkSync<C: Collaborator> {
    inner: Rc<Inner<C>>,
}

impl<C: Collaborator> Clone for BookmarkSync<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Collaborator + 'static> BookmarkSync<C> {
    pub fn new(
        client: Rc<C>,
        navigator: Rc<dyn Navigator>,
        spawner: Rc<dyn LocalSpawn>,
        observer: Rc<dyn SyncObserver>,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                store: BookmarkStore::new(client.clone()),
                client,
                navigator,
                spawner,
                observer,
                phase: Cell::new(Phase::Idle),
                identity: RefCell::new(None),
                list: RefCell::new(ListState::default()),
                live: Cell::new(false),
                missed_changes: Cell::new(false),
                subscription: RefCell::new(None),
            }),
        }
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.identity.borrow().clone()
    }

    pub fn items(&self) -> Vec<Bookmark> {
        self.inner.list.borrow().items().to_vec()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.list.borrow().is_loaded()
    }

    fn torn_down(&self) -> bool {
        self.inner.phase.get() == Phase::TornDown
    }

    fn owner_id(&self) -> SyncResult<String> {
        self.inner
            .identity
            .borrow()
            .as_ref()
            .map(|i| i.id.clone())
            .ok_or(SyncError::Unauthenticated)
    }

    fn notify_list(&self) {
        if self.torn_down() {
            return;
        }
        let items = self.items();
        self.inner.observer.list_changed(&items);
    }

    /// Guard, project, fetch, subscribe, in that order.
    ///
    /// A second call returns the existing identity without opening another
    /// subscription.
    pub async fn activate(&self, now_secs: i64) -> SyncResult<Activation> {
        match self.inner.phase.get() {
            Phase::Idle => {}
            Phase::Active => {
                return Ok(self
                    .identity()
                    .map_or(Activation::Cancelled, Activation::Ready))
            }
            Phase::Activating | Phase::TornDown => return Ok(Activation::Cancelled),
        }
        self.inner.phase.set(Phase::Activating);

        let session =
            match require_session(&*self.inner.client, &*self.inner.navigator, now_secs).await {
                Ok(s) => s,
                Err(e) => {
                    if !self.torn_down() {
                        self.inner.phase.set(Phase::Idle);
                    }
                    return Err(e);
                }
            };
        if self.torn_down() {
            return Ok(Activation::Cancelled);
        }

        let identity = identity::project(&session.user);
        *self.inner.identity.borrow_mut() = Some(identity.clone());

        // A failed first load counts as "no data": the list is loaded and empty.
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "initial fetch failed, showing empty list");
            if !self.torn_down() {
                self.inner.list.borrow_mut().mark_loaded();
                self.notify_list();
            }
        }
        if self.torn_down() {
            return Ok(Activation::Cancelled);
        }

        self.subscribe(&identity.id);
        self.inner.phase.set(Phase::Active);
        Ok(Activation::Ready(identity))
    }

    fn subscribe(&self, owner_id: &str) {
        if self.inner.subscription.borrow().is_some() {
            return;
        }

        let spec = SubscriptionSpec {
            channel: CHANNEL_NAME.to_string(),
            schema: SCHEMA.to_string(),
            table: BOOKMARKS_TABLE.to_string(),
            filter: Some(format!("{OWNER_COLUMN}=eq.{owner_id}")),
        };

        let weak: Weak<Inner<C>> = Rc::downgrade(&self.inner);
        let on_event = Rc::new(move |event: RealtimeEvent| {
            if let Some(inner) = weak.upgrade() {
                BookmarkSync { inner }.on_realtime_event(event);
            }
        });

        match self.inner.client.subscribe(spec, on_event) {
            Ok(handle) => {
                tracing::info!(owner = owner_id, "realtime subscription opened");
                *self.inner.subscription.borrow_mut() = Some(Subscription {
                    client: self.inner.client.clone(),
                    handle: Some(handle),
                });
            }
            Err(e) => {
                // Degraded: the list stops updating live until the next manual refresh.
                tracing::warn!(owner = owner_id, error = %e, "realtime subscription failed");
            }
        }
    }

    fn on_realtime_event(&self, event: RealtimeEvent) {
        if self.torn_down() {
            return;
        }

        match event {
            RealtimeEvent::Change(change) => {
                tracing::debug!(kind = %change.kind, id = ?change.record_id, "remote change");
                self.spawn_refresh();
            }
            RealtimeEvent::Status(status) => {
                match status {
                    ChannelStatus::Subscribed => {
                        self.inner.live.set(true);
                        if self.inner.missed_changes.replace(false) {
                            tracing::info!("channel rejoined, catching up");
                            self.spawn_refresh();
                        }
                    }
                    ChannelStatus::Reconnecting { attempt, delay_ms } => {
                        self.inner.live.set(false);
                        self.inner.missed_changes.set(true);
                        tracing::warn!(attempt, delay_ms, "realtime channel reconnecting");
                    }
                    ChannelStatus::Connecting | ChannelStatus::Closed => {
                        self.inner.live.set(false);
                    }
                }
                self.inner.observer.connection_changed(status);
            }
        }
    }

    fn spawn_refresh(&self) {
        let this = self.clone();
        if let Err(e) = self.inner.spawner.spawn_local(async move {
            let _ = this.refresh().await;
        }) {
            tracing::error!(error = %e, "could not schedule refetch");
        }
    }

    /// Sequenced full refetch. A result overtaken by a newer fetch, or one
    /// arriving after teardown, is dropped.
    pub async fn refresh(&self) -> SyncResult<()> {
        let owner = self.owner_id()?;
        let seq = self.inner.list.borrow_mut().begin_fetch();

        let items = self.inner.store.fetch_all(&owner).await?;

        if self.torn_down() {
            tracing::debug!(seq, "fetch resolved after teardown, discarded");
            return Ok(());
        }
        if !self.inner.list.borrow_mut().apply_fetch(seq, items) {
            tracing::warn!(seq, "stale fetch result discarded");
            return Ok(());
        }

        self.notify_list();
        Ok(())
    }

    /// Create goes straight to the store; the list is refreshed by the
    /// realtime echo, or directly when the channel is not live.
    pub async fn add(&self, title: &str, url: &str) -> SyncResult<CreateOutcome> {
        let owner = self.owner_id()?;
        let outcome = self.inner.store.create(&owner, title, url).await?;

        if outcome == CreateOutcome::Accepted && !self.inner.live.get() {
            let _ = self.refresh().await;
        }
        Ok(outcome)
    }

    /// Optimistic delete: the row leaves the local list before the remote
    /// call resolves; on failure a refetch restores the true state.
    pub async fn delete(&self, id: &str) -> SyncResult<()> {
        let owner = self.owner_id()?;

        let removed = self.inner.list.borrow_mut().remove(id);
        if removed.is_some() {
            self.notify_list();
        }

        match self.inner.store.delete(&owner, id).await {
            Ok(()) => {
                tracing::info!(id, "bookmark deleted");
                Ok(())
            }
            Err(e) => {
                tracing::error!(id, error = %e, "delete failed, rolling back");
                let _ = self.refresh().await;
                Err(e)
            }
        }
    }

    /// Release the subscription and stop delivering updates. Idempotent.
    pub fn teardown(&self) {
        if self.inner.phase.replace(Phase::TornDown) != Phase::TornDown {
            tracing::debug!("bookmark sync torn down");
        }
        self.inner.live.set(false);
        let subscription = self.inner.subscription.borrow_mut().take();
        drop(subscription);
    }

    pub async fn sign_out(&self) {
        self.teardown();
        if let Err(e) = self.inner.client.sign_out().await {
            tracing::warn!(error = %e, "sign out failed, clearing local session anyway");
        }
        self.inner.navigator.redirect(LOGIN_PATH);
    }
}
