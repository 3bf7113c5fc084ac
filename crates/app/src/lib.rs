#![deny(unsafe_code)]

/// Terminal front end for the chat.
///
/// Reads one line per submit, prints the transcript as the controller publishes snapshots.
pub mod app;
/// Conversation controller, message model, and request lifecycle.
pub mod chat;
pub mod settings;
