//! Chat-bot client support.
//!
//! The bot keeps short-lived conversation state (pending step, selected plan,
//! draft values) per chat. Command dispatch lives with the bot server.

pub mod session;

pub use session::{session_key, MemorySessionStore, SessionStore, SqliteSessionStore};
