//! Client for the OpenAI-compatible Assistants API (threads, messages and
//! runs) used to host the tutoring conversations.

pub mod openai;
pub mod traits;
pub mod types;
pub(crate) mod util;

// Re-exports for convenience.
pub use openai::OpenAiAssistantsClient;
pub use traits::AssistantsApi;
pub use types::{
    ContentPart, ListOrder, MessageList, MessageQuery, Role, Run, RunError, RunRequest,
    RunStatus, TextContent, ThreadMessage,
};
