use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Relational store holding identity → thread bindings.
///
/// The URL scheme selects the backend: `sqlite:` or `mysql:`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "d_url")]
    pub url: String,
    /// When this environment variable is set it overrides `url`.
    #[serde(default = "d_url_env")]
    pub url_env: String,
    #[serde(default = "d_table")]
    pub table: String,
    #[serde(default = "d_max_connections")]
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: d_url(),
            url_env: d_url_env(),
            table: d_table(),
            max_connections: d_max_connections(),
        }
    }
}

impl StoreConfig {
    /// The effective connection URL after applying the env override.
    pub fn effective_url(&self) -> String {
        std::env::var(&self.url_env)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.url.clone())
    }
}

fn d_url() -> String {
    "sqlite://tutorline.db".into()
}
fn d_url_env() -> String {
    "DATABASE_URL".into()
}
fn d_table() -> String {
    "chatbot_english_db".into()
}
fn d_max_connections() -> u32 {
    5
}
