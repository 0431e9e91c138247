use crate::api::SupabaseClient;
use crate::backend::{AuthProvider, ChannelStatus, OAuthProvider};
use crate::components::ui::{
    Alert, AlertDescription, Avatar, Button, ButtonSize, ButtonVariant, Card, CardContent,
    CardDescription, CardHeader, CardItem, CardList, CardTitle, Input, Label, Spinner,
};
use crate::models::{Bookmark, Identity};
use crate::state::{AppContext, BrowserSpawner, RouterNavigator};
use crate::store::CreateOutcome;
use crate::sync::{Activation, BookmarkSync, SyncObserver};
use crate::util::now_secs;
use icons::{Bookmark as BookmarkIcon, ExternalLink, LogOut, Plus, Trash2};
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_dom::helpers::set_timeout;
use leptos_router::components::Redirect;
use std::rc::Rc;
use std::time::Duration;

const WELCOME_TOAST: Duration = Duration::from_secs(3);

#[component]
pub fn LoginPage() -> impl IntoView {
    let loading: RwSignal<bool> = RwSignal::new(false);
    let app_state = expect_context::<AppContext>();

    let on_click = move |_: web_sys::MouseEvent| {
        if loading.get_untracked() {
            return;
        }
        let client = app_state.client.get_value();
        loading.set(true);

        spawn_local(async move {
            // On success the browser leaves the page; only failures come back here.
            if let Err(e) = client.sign_in_with_oauth(OAuthProvider::Google).await {
                tracing::error!(error = %e, "sign-in failed");
                loading.try_set(false);
            }
        });
    };

    view! {
        <div class="min-h-screen bg-background">
            <div class="mx-auto flex min-h-screen w-full max-w-sm flex-col justify-center px-4 py-10">
                <div class="mb-6 flex items-center justify-center gap-2 text-foreground">
                    <BookmarkIcon class="size-5" />
                    <span class="text-sm font-medium">"Bookmarks"</span>
                </div>

                <Card>
                    <CardHeader>
                        <CardTitle class="text-lg">"Sign in"</CardTitle>
                        <CardDescription class="text-xs">"Securely store and sync your links."</CardDescription>
                    </CardHeader>
                    <CardContent>
                        <Button
                            class="w-full"
                            variant=ButtonVariant::Outline
                            on:click=on_click
                            attr:disabled=move || loading.get()
                        >
                            <Show when=move || loading.get() fallback=|| ().into_view()>
                                <Spinner />
                            </Show>
                            {move || if loading.get() { "Redirecting..." } else { "Continue with Google" }}
                        </Button>
                    </CardContent>
                </Card>
            </div>
        </div>
    }
}

/// Pushes controller state into the view's signals.
///
/// `try_set` because notifications can land after the view is disposed.
#[derive(Clone, Copy)]
struct SignalObserver {
    items: RwSignal<Vec<Bookmark>>,
    loaded: RwSignal<bool>,
    status: RwSignal<Option<ChannelStatus>>,
}

impl SyncObserver for SignalObserver {
    fn list_changed(&self, items: &[Bookmark]) {
        self.items.try_set(items.to_vec());
        self.loaded.try_set(true);
    }

    fn connection_changed(&self, status: ChannelStatus) {
        self.status.try_set(Some(status));
    }
}

#[component]
pub fn BookmarksPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let items: RwSignal<Vec<Bookmark>> = RwSignal::new(vec![]);
    let loaded: RwSignal<bool> = RwSignal::new(false);
    let status: RwSignal<Option<ChannelStatus>> = RwSignal::new(None);
    let identity: RwSignal<Option<Identity>> = RwSignal::new(None);
    let toast: RwSignal<Option<String>> = RwSignal::new(None);

    let sync = BookmarkSync::new(
        Rc::new(app_state.client.get_value()),
        Rc::new(RouterNavigator::from_router()),
        Rc::new(BrowserSpawner),
        Rc::new(SignalObserver {
            items,
            loaded,
            status,
        }),
    );
    let sync = StoredValue::new_local(sync);

    on_cleanup(move || {
        let _ = sync.try_with_value(|s| s.teardown());
    });

    spawn_local(async move {
        let Some(s) = sync.try_get_value() else {
            return;
        };
        match s.activate(now_secs()).await {
            Ok(Activation::Ready(who)) => {
                toast.try_set(Some(format!("Welcome back, {}", who.display_name)));
                identity.try_set(Some(who));
                set_timeout(
                    move || {
                        toast.try_set(None);
                    },
                    WELCOME_TOAST,
                );
            }
            Ok(Activation::Cancelled) => {}
            // Already redirected to login.
            Err(e) => tracing::debug!(error = %e, "bookmarks view not activated"),
        }
    });

    let on_sign_out = move |_: web_sys::MouseEvent| {
        if let Some(s) = sync.try_get_value() {
            spawn_local(async move { s.sign_out().await });
        }
    };

    let on_delete = Callback::new(move |id: String| {
        if let Some(s) = sync.try_get_value() {
            spawn_local(async move {
                // Failure is logged and rolled back inside the controller.
                let _ = s.delete(&id).await;
            });
        }
    });

    view! {
        <div class="min-h-screen bg-background">
            <header class="border-b">
                <div class="mx-auto flex w-full max-w-2xl items-center justify-between gap-3 px-4 py-3">
                    <div class="flex items-center gap-2 text-foreground">
                        <BookmarkIcon class="size-4" />
                        <span class="text-sm font-medium">"Bookmarks"</span>
                        <LiveIndicator status=status />
                    </div>

                    {move || identity.get().map(|who| {
                        let initial = who.initial();
                        view! {
                            <div class="flex items-center gap-2">
                                <span class="hidden text-xs text-muted-foreground sm:inline">{who.display_name.clone()}</span>
                                <Avatar name=who.display_name initial=initial src=who.avatar_url />
                                <Button
                                    variant=ButtonVariant::Ghost
                                    size=ButtonSize::Sm
                                    attr:title="Sign out"
                                    on:click=on_sign_out
                                >
                                    <LogOut />
                                    "Sign out"
                                </Button>
                            </div>
                        }
                    })}
                </div>
            </header>

            <main class="mx-auto flex w-full max-w-2xl flex-col gap-4 px-4 py-6">
                <AddBookmarkForm sync=sync />

                <Card>
                    <CardContent>
                        <Show
                            when=move || loaded.get()
                            fallback=|| view! {
                                <div class="flex items-center gap-2 py-6 text-xs text-muted-foreground">
                                    <Spinner />
                                    "Loading..."
                                </div>
                            }
                        >
                            <Show
                                when=move || !items.with(|v| v.is_empty())
                                fallback=|| view! {
                                    <div class="py-6 text-center text-sm text-muted-foreground">"No bookmarks yet."</div>
                                }
                            >
                                <CardList>
                                    <For
                                        each=move || items.get()
                                        key=|b: &Bookmark| b.id.clone()
                                        children=move |b: Bookmark| view! { <BookmarkRow bookmark=b on_delete=on_delete /> }
                                    />
                                </CardList>
                            </Show>
                        </Show>
                    </CardContent>
                </Card>
            </main>

            {move || toast.get().map(|msg| view! {
                <div class="fixed bottom-4 left-1/2 -translate-x-1/2 rounded-md border bg-card px-4 py-2 text-sm shadow-md" role="status">
                    {msg}
                </div>
            })}
        </div>
    }
}

#[component]
fn LiveIndicator(status: RwSignal<Option<ChannelStatus>>) -> impl IntoView {
    let label = move || match status.get() {
        None | Some(ChannelStatus::Connecting) => ("bg-muted-foreground", "Connecting".to_string()),
        Some(ChannelStatus::Subscribed) => ("bg-green-500", "Live".to_string()),
        Some(ChannelStatus::Reconnecting { attempt, delay_ms }) => (
            "bg-amber-500",
            format!("Reconnecting in {}s (attempt {attempt})", delay_ms.div_ceil(1000)),
        ),
        Some(ChannelStatus::Closed) => ("bg-destructive", "Offline".to_string()),
    };

    view! {
        <span class="inline-flex items-center gap-1.5 text-xs text-muted-foreground">
            <span class=move || format!("size-2 rounded-full {}", label().0)></span>
            {move || label().1}
        </span>
    }
}

#[component]
fn AddBookmarkForm(sync: StoredValue<BookmarkSync<SupabaseClient>, LocalStorage>) -> impl IntoView {
    let title: RwSignal<String> = RwSignal::new(String::new());
    let url: RwSignal<String> = RwSignal::new(String::new());
    let hint: RwSignal<Option<String>> = RwSignal::new(None);
    let submitting: RwSignal<bool> = RwSignal::new(false);

    let on_submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        if submitting.get_untracked() {
            return;
        }
        let Some(s) = sync.try_get_value() else {
            return;
        };

        let title_val = title.get_untracked();
        let url_val = url.get_untracked();
        submitting.set(true);

        spawn_local(async move {
            match s.add(&title_val, &url_val).await {
                Ok(CreateOutcome::Accepted) => {
                    title.try_set(String::new());
                    url.try_set(String::new());
                    hint.try_set(None);
                }
                Ok(CreateOutcome::Rejected(reason)) => {
                    hint.try_set(Some(reason.to_string()));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "bookmark not saved");
                    hint.try_set(Some("Could not save the bookmark. Try again.".to_string()));
                }
            }
            submitting.try_set(false);
        });
    };

    view! {
        <Card>
            <CardContent>
                <form class="flex flex-col gap-3 sm:flex-row sm:items-end" on:submit=on_submit>
                    <div class="flex flex-1 flex-col gap-1.5">
                        <Label html_for="bookmark-title">"Title"</Label>
                        <Input
                            id="bookmark-title"
                            placeholder="Rust book"
                            bind_value=title
                            disabled=Signal::derive(move || submitting.get())
                        />
                    </div>
                    <div class="flex flex-1 flex-col gap-1.5">
                        <Label html_for="bookmark-url">"URL"</Label>
                        <Input
                            id="bookmark-url"
                            placeholder="doc.rust-lang.org/book"
                            bind_value=url
                            disabled=Signal::derive(move || submitting.get())
                            invalid=Signal::derive(move || hint.get().is_some())
                        />
                    </div>
                    <Button attr:disabled=move || submitting.get()>
                        <Show when=move || submitting.get() fallback=|| view! { <Plus /> }>
                            <Spinner />
                        </Show>
                        "Add"
                    </Button>
                </form>

                {move || hint.get().map(|msg| view! {
                    <Alert class="mt-3 border-destructive/30">
                        <AlertDescription class="text-destructive">{msg}</AlertDescription>
                    </Alert>
                })}
            </CardContent>
        </Card>
    }
}

#[component]
fn BookmarkRow(bookmark: Bookmark, on_delete: Callback<String>) -> impl IntoView {
    let id = bookmark.id.clone();

    view! {
        <CardItem>
            <div class="flex min-w-0 flex-1 flex-col">
                <span class="truncate text-sm font-medium">{bookmark.title}</span>
                <span class="truncate text-xs text-muted-foreground">{bookmark.url.clone()}</span>
            </div>
            <a
                class="inline-flex size-8 items-center justify-center rounded-md text-muted-foreground hover:bg-accent hover:text-accent-foreground"
                href=bookmark.url
                target="_blank"
                rel="noopener noreferrer"
                title="Open"
            >
                <ExternalLink class="size-4" />
            </a>
            <Button
                variant=ButtonVariant::Ghost
                size=ButtonSize::Icon
                attr:title="Delete"
                on:click=move |_| on_delete.run(id.clone())
            >
                <Trash2 class="text-destructive" />
            </Button>
        </CardItem>
    }
}

#[component]
pub fn RootPage() -> impl IntoView {
    view! { <Redirect path="/bookmarks" /> }
}
