//! Learner sessions: cookie identity decoding, the identity → thread
//! store, and get-or-create thread resolution.

pub mod identity;
pub mod lock;
pub mod resolver;
pub mod store;

pub use identity::{cookie_value, Identity, IdentityDecoder};
pub use lock::IdentityLocks;
pub use resolver::SessionResolver;
pub use store::{connect, MySqlSessionStore, SessionRecord, SessionStore, SqliteSessionStore};
