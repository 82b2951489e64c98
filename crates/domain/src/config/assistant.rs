use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Assistants service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection settings for the OpenAI-compatible Assistants API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// Assistant used to start runs. Falls back to `$assistant_id_env`.
    #[serde(default)]
    pub assistant_id: Option<String>,
    #[serde(default = "d_assistant_id_env")]
    pub assistant_id_env: String,
    /// Per-request HTTP timeout.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries on transient (5xx / timeout) failures.
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    /// Replaces the built-in tutoring instructions when set.
    #[serde(default)]
    pub instructions: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            assistant_id: None,
            assistant_id_env: d_assistant_id_env(),
            timeout_ms: d_timeout_ms(),
            max_retries: d_max_retries(),
            instructions: None,
        }
    }
}

fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn d_assistant_id_env() -> String {
    "ASSISTANT_ID".into()
}
fn d_timeout_ms() -> u64 {
    60_000
}
fn d_max_retries() -> u32 {
    2
}
