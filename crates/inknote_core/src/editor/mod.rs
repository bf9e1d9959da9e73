//! Ink editor sessions.

mod session;

pub use session::{BoundEditor, EditorSession, SessionState};
