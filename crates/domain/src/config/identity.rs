use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Identity token
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where the encrypted identity cookie lives and how to decrypt it.
///
/// The secret is resolved once at startup with this precedence:
/// 1. `key` (plaintext in config, warned)
/// 2. the environment variable named by `key_env`
/// 3. the built-in legacy default `"key"` (warned)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Cookie carrying the encrypted identity.
    #[serde(default = "d_cookie_name")]
    pub cookie_name: String,
    /// Request header holding the cookie string. Clients send `Cookies`;
    /// the standard `Cookie` header is consulted when it is absent.
    #[serde(default = "d_header_name")]
    pub header_name: String,
    #[serde(default = "d_key_env")]
    pub key_env: String,
    #[serde(default)]
    pub key: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            cookie_name: d_cookie_name(),
            header_name: d_header_name(),
            key_env: d_key_env(),
            key: None,
        }
    }
}

fn d_cookie_name() -> String {
    "ESDUBAI_STUDENT_ID".into()
}
fn d_header_name() -> String {
    "Cookies".into()
}
fn d_key_env() -> String {
    "TL_IDENTITY_KEY".into()
}
