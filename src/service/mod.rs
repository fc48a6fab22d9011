//! Service layer module

pub mod editor;
pub mod library;
pub mod session;
pub mod types;

pub use editor::EditorService;
pub use library::LibraryService;
pub use session::{HandoffStore, SessionStore};
pub use types::*;
