//! Shared helpers for the HTTP adapter.

use tl_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Every transport failure is an assistants-service failure from the
/// caller's point of view; timeouts are labelled as such.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::ExternalService(format!("request timed out: {e}"))
    } else {
        Error::ExternalService(e.to_string())
    }
}

/// Read the API key from the environment variable named by `env_var`.
pub fn resolve_api_key(env_var: &str) -> Result<String> {
    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::Config(format!(
            "environment variable '{env_var}' not set or empty"
        ))),
    }
}

/// Trim a response body for inclusion in an error message.
pub(crate) fn snippet(body: &str) -> &str {
    const MAX: usize = 512;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_env_var() {
        let var_name = "TL_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        assert_eq!(resolve_api_key(var_name).unwrap(), "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_missing_is_config_error() {
        let err = resolve_api_key("TL_TEST_DEFINITELY_UNSET_5678").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let body = "é".repeat(400);
        let s = snippet(&body);
        assert!(s.len() <= 512);
        assert!(s.chars().all(|c| c == 'é'));
    }
}
