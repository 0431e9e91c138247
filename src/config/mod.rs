//! Runtime configuration read from `window.ENV`.
//!
//! ```html
//! <script>
//!   window.ENV = {
//!     SUPABASE_URL: "https://xyz.supabase.co",
//!     SUPABASE_ANON_KEY: "eyJ...",
//!     LOG_LEVEL: "debug",
//!   };
//! </script>
//! ```
//!
//! Lower-case keys (`supabase_url`, ...) are accepted as well.

use serde::{Deserialize, Serialize};

const DEFAULT_SUPABASE_URL: &str = "http://localhost:54321";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RealtimeConfig {
    pub heartbeat_ms: i32,
    pub reconnect_base_ms: u32,
    pub reconnect_max_ms: u32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_ms: 25_000,
            reconnect_base_ms: 1_000,
            reconnect_max_ms: 30_000,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EnvConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub log_level: tracing_level::Level,
    pub realtime: RealtimeConfig,
}

/// `tracing::Level` has no serde support; keep a mirror that does.
pub mod tracing_level {
    use serde::{Deserialize, Serialize};

    #[derive(
        Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, strum::EnumString, strum::Display,
    )]
    #[strum(ascii_case_insensitive, serialize_all = "lowercase")]
    pub enum Level {
        Error,
        Warn,
        Info,
        Debug,
        Trace,
    }

    impl From<Level> for tracing::Level {
        fn from(l: Level) -> Self {
            match l {
                Level::Error => tracing::Level::ERROR,
                Level::Warn => tracing::Level::WARN,
                Level::Info => tracing::Level::INFO,
                Level::Debug => tracing::Level::DEBUG,
                Level::Trace => tracing::Level::TRACE,
            }
        }
    }
}

impl EnvConfig {
    /// Resolve from a key lookup; `UPPER_CASE` keys win over `lower_case` ones.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .or_else(|| lookup(&key.to_ascii_lowercase()))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let log_level = get("LOG_LEVEL")
            .and_then(|v| v.parse().ok())
            .unwrap_or(tracing_level::Level::Info);

        Self {
            supabase_url: get("SUPABASE_URL")
                .unwrap_or_else(|| DEFAULT_SUPABASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            supabase_anon_key: get("SUPABASE_ANON_KEY").unwrap_or_default(),
            log_level,
            realtime: RealtimeConfig::default(),
        }
    }

    pub fn new() -> Self {
        let env = web_sys::window()
            .and_then(|w| w.get("ENV"))
            .filter(|env| !env.is_undefined() && env.is_object());

        Self::resolve(|key| {
            let env = env.as_ref()?;
            js_sys::Reflect::get(env, &key.into()).ok()?.as_string()
        })
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}
