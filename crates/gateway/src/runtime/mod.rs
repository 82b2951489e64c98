//! Answer production: run a tutoring turn on a thread, then pace the answer
//! out to the client.

pub mod instructions;
pub mod stream;
pub mod waiter;

pub use stream::emit;
pub use waiter::RunWaiter;
