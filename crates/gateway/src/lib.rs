//! Tutorline HTTP gateway: cookie-identified learners chat with an
//! English-tutoring assistant hosted on the Assistants API.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
