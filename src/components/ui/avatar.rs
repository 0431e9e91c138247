use leptos::prelude::*;
use tw_merge::tw_merge;

/// Round avatar: the image when a URL is known, otherwise the initial.
#[component]
pub fn Avatar(
    #[prop(into)] name: String,
    #[prop(into)] initial: String,
    src: Option<String>,
    #[prop(into, optional)] class: String,
) -> impl IntoView {
    let class = tw_merge!(
        "inline-flex size-8 shrink-0 items-center justify-center overflow-hidden rounded-full bg-muted text-xs font-medium text-muted-foreground",
        class
    );

    let title = name.clone();

    view! {
        <span data-name="Avatar" class=class title=title>
            {match src {
                Some(src) => view! {
                    <img class="size-full object-cover" src=src alt=name referrerpolicy="no-referrer" />
                }.into_any(),
                None => view! { <span>{initial}</span> }.into_any(),
            }}
        </span>
    }
}
