use crate::api::SupabaseClient;
use crate::pages::{BookmarksPage, LoginPage, RootPage};
use crate::state::AppContext;
use leptos::prelude::*;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;

#[component]
pub fn App(client: SupabaseClient) -> impl IntoView {
    provide_context(AppContext::new(client));

    view! {
        <Router>
            <Routes fallback=|| view! { <div class="px-4 py-8 text-xs text-muted-foreground">"Not found"</div> }>
                <Route path=path!("login") view=LoginPage />
                <Route path=path!("bookmarks") view=BookmarksPage />
                <Route path=path!("") view=RootPage />
            </Routes>
        </Router>
    }
}
