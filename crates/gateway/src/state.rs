use std::sync::Arc;

use tl_assistants::AssistantsApi;
use tl_domain::config::Config;
use tl_sessions::{IdentityDecoder, SessionResolver};
use tokio_util::sync::CancellationToken;

use crate::runtime::RunWaiter;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub decoder: Arc<IdentityDecoder>,
    pub resolver: Arc<SessionResolver>,
    pub assistants: Arc<dyn AssistantsApi>,
    pub waiter: Arc<RunWaiter>,
    /// Assistant bound to newly created sessions and used to start runs.
    pub assistant_id: Arc<str>,
    /// Cancelled on server shutdown; in-flight run waits observe it.
    pub shutdown: CancellationToken,
}
