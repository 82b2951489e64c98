//! AppState construction extracted from `main.rs`.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use tl_assistants::{AssistantsApi, OpenAiAssistantsClient};
use tl_domain::config::{AssistantConfig, Config, ConfigSeverity};
use tl_sessions::{IdentityDecoder, SessionResolver};

use crate::runtime::{instructions, RunWaiter};
use crate::state::AppState;

/// Validate config, connect the session store and the Assistants client,
/// and return a fully-wired [`AppState`].
pub async fn build_app_state(
    config: Arc<Config>,
    shutdown: CancellationToken,
) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Identity decoder ─────────────────────────────────────────────
    let decoder = Arc::new(IdentityDecoder::from_config(&config.identity));
    tracing::info!(cookie = %decoder.cookie_name(), "identity decoder ready");

    // ── Assistants client ────────────────────────────────────────────
    let assistant_id = resolve_assistant_id(&config.assistant).with_context(|| {
        format!(
            "no assistant id: set [assistant] assistant_id or ${}",
            config.assistant.assistant_id_env
        )
    })?;
    let assistants: Arc<dyn AssistantsApi> = Arc::new(
        OpenAiAssistantsClient::from_config(&config.assistant)
            .context("creating Assistants client")?,
    );
    tracing::info!(
        base_url = %config.assistant.base_url,
        assistant_id = %assistant_id,
        "Assistants client ready"
    );

    // ── Session store ────────────────────────────────────────────────
    let store = tl_sessions::connect(&config.store)
        .await
        .context("connecting session store")?;
    tracing::info!(table = %config.store.table, "session store ready");

    let resolver = Arc::new(SessionResolver::new(store, assistants.clone()));

    // ── Run waiter ───────────────────────────────────────────────────
    let prompt = config
        .assistant
        .instructions
        .clone()
        .unwrap_or_else(|| instructions::TUTOR_INSTRUCTIONS.to_owned());
    let waiter = Arc::new(RunWaiter::new(assistants.clone(), &config.runs, prompt));
    tracing::info!(
        poll_interval_ms = config.runs.poll_interval_ms,
        deadline_secs = ?config.runs.deadline_secs,
        "run waiter ready"
    );

    Ok(AppState {
        config,
        decoder,
        resolver,
        assistants,
        waiter,
        assistant_id: Arc::from(assistant_id),
        shutdown,
    })
}

/// The configured assistant id, falling back to `$assistant_id_env`.
pub fn resolve_assistant_id(cfg: &AssistantConfig) -> Option<String> {
    cfg.assistant_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .or_else(|| {
            std::env::var(&cfg.assistant_id_env)
                .ok()
                .filter(|id| !id.trim().is_empty())
        })
}
