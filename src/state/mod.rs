use crate::api::SupabaseClient;
use crate::backend::Navigator;
use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
use leptos::prelude::*;
use leptos_router::hooks::use_navigate;
use leptos_router::NavigateOptions;

/// App-wide handles. The client is `!Send`, so it lives in local arena storage.
#[derive(Clone, Copy)]
pub(crate) struct AppContext {
    pub client: StoredValue<SupabaseClient, LocalStorage>,
}

impl AppContext {
    pub fn new(client: SupabaseClient) -> Self {
        Self {
            client: StoredValue::new_local(client),
        }
    }
}

/// Runs controller tasks on the browser microtask queue.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct BrowserSpawner;

impl LocalSpawn for BrowserSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        leptos::task::spawn_local(future);
        Ok(())
    }
}

/// Client-side navigation through the router; replaces the current entry.
pub(crate) struct RouterNavigator {
    navigate: Box<dyn Fn(&str, NavigateOptions)>,
}

impl RouterNavigator {
    /// Must be called inside a `<Router>`.
    pub fn from_router() -> Self {
        Self {
            navigate: Box::new(use_navigate()),
        }
    }
}

impl Navigator for RouterNavigator {
    fn redirect(&self, path: &str) {
        tracing::debug!(path, "navigating");
        (self.navigate)(
            path,
            NavigateOptions {
                replace: true,
                ..Default::default()
            },
        );
    }
}
