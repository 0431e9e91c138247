pub mod api;
mod app;
pub mod backend;
mod components;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod models;
mod pages;
pub mod realtime;
pub mod session;
mod state;
mod storage;
pub mod store;
pub mod sync;
mod util;

use crate::api::SupabaseClient;
use crate::app::App;
use crate::config::EnvConfig;
use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;


// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();

    let config = EnvConfig::new();
    logging::init(config.log_level.into());
    tracing::info!(url = %config.supabase_url, "starting bookmarks app");

    let client = SupabaseClient::new(config);
    mount_to_body(move || view! { <App client=client /> });
}
